//! Request outcome logging through tracing and metrics

use tracing::{error, info, warn};

use crate::domain::request_log::{Disposition, RequestLogEntry, RequestLogger};
use crate::infrastructure::observability::record_request;

/// Writes one structured event per request and bumps the request counters
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogger;

impl TracingRequestLogger {
    pub fn new() -> Self {
        Self
    }
}

impl RequestLogger for TracingRequestLogger {
    fn log_outcome(&self, entry: RequestLogEntry) {
        record_request(
            &entry.method,
            &entry.path,
            entry.disposition.as_str(),
            entry.status,
            entry.latency,
        );

        let client_ip = entry.client_ip.map(|ip| ip.to_string());
        let auth_method = entry.auth_method.map(|m| m.as_str());
        let latency_ms = entry.latency.as_millis() as u64;

        macro_rules! emit {
            ($level:ident) => {
                $level!(
                    target: "gatekeeper::request",
                    request_id = %entry.request_id,
                    method = %entry.method,
                    path = %entry.path,
                    client_ip = ?client_ip,
                    origin = ?entry.origin,
                    credential_id = ?entry.credential_id,
                    user_id = ?entry.user_id,
                    auth_method = ?auth_method,
                    disposition = entry.disposition.as_str(),
                    status = entry.status,
                    latency_ms,
                    error_reason = ?entry.error_reason,
                    "Request handled"
                )
            };
        }

        match entry.disposition {
            Disposition::Error | Disposition::TimedOut => emit!(error),
            Disposition::AuthenticationFailed | Disposition::Denied => emit!(warn),
            Disposition::Bypassed
            | Disposition::PreAuthenticated
            | Disposition::Anonymous
            | Disposition::Admitted => emit!(info),
        }
    }
}

/// Collects entries in memory
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingRequestLogger {
    entries: std::sync::Arc<std::sync::Mutex<Vec<RequestLogEntry>>>,
}

#[cfg(test)]
impl RecordingRequestLogger {
    pub fn entries(&self) -> Vec<RequestLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl RequestLogger for RecordingRequestLogger {
    fn log_outcome(&self, entry: RequestLogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}
