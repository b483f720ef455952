//! Application state for shared services

use std::sync::Arc;

use crate::domain::credential::CredentialStore;
use crate::infrastructure::credential::CredentialService;
use crate::infrastructure::quota::QuotaResetScheduler;

use super::middleware::{HeaderRedactor, RequestPipeline};

/// Shared handles for handlers and middleware
#[derive(Debug, Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
    pub scheduler: Arc<QuotaResetScheduler>,
    pub pipeline: Arc<RequestPipeline>,
    pub redactor: Arc<HeaderRedactor>,
}

impl AppState {
    pub fn new(
        credentials: CredentialService,
        scheduler: QuotaResetScheduler,
        pipeline: RequestPipeline,
        redactor: HeaderRedactor,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            scheduler: Arc::new(scheduler),
            pipeline: Arc::new(pipeline),
            redactor: Arc::new(redactor),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.credentials.store()
    }
}
