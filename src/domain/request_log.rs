//! Request outcome logging seam

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use super::auth::Credentials;

/// How the pipeline finished a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Bypassed authentication (preflight, probe or excluded path)
    Bypassed,
    /// Identity was established before the pipeline ran
    PreAuthenticated,
    /// No credentials presented and authentication is optional
    Anonymous,
    Admitted,
    AuthenticationFailed,
    Denied,
    Error,
    TimedOut,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypassed => "bypassed",
            Self::PreAuthenticated => "pre_authenticated",
            Self::Anonymous => "anonymous",
            Self::Admitted => "admitted",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Denied => "denied",
            Self::Error => "error",
            Self::TimedOut => "timed_out",
        }
    }
}

/// One entry per handled request. Never carries secret material.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: Option<IpAddr>,
    pub origin: Option<String>,
    pub credential_id: Option<String>,
    pub user_id: Option<String>,
    pub auth_method: Option<Credentials>,
    pub disposition: Disposition,
    pub status: u16,
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    pub error_reason: Option<String>,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

/// Sink for request outcomes; called exactly once per request.
///
/// Implementations must not block the response path.
pub trait RequestLogger: Send + Sync {
    fn log_outcome(&self, entry: RequestLogEntry);
}
