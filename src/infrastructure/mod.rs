//! Infrastructure layer - stores, verifiers and background services

pub mod admission;
pub mod auth;
pub mod credential;
pub mod crypto;
pub mod logging;
pub mod observability;
pub mod quota;
pub mod request_log;
