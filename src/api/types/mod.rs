//! Shared request and response types

pub mod credential;
pub mod error;
pub mod json;

pub use credential::{CredentialResponse, IssuedCredentialResponse};
pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
