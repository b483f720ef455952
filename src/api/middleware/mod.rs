//! Request gate middleware

pub mod client;
pub mod exclusion;
pub mod logging;
pub mod pipeline;
pub mod principal;

pub use client::{client_info, request_origin};
pub use exclusion::{is_preflight, BypassReason, ExclusionRules, PathPattern};
pub use logging::{header_logging_middleware, HeaderRedactor};
pub use pipeline::{
    gatekeeper_middleware, RequestPipeline, X_QUOTA_LIMIT, X_QUOTA_REMAINING, X_QUOTA_STATUS,
    X_REQUEST_ID,
};
pub use principal::Principal;
