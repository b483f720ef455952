//! Authentication domain
//!
//! Method selection, typed outcomes and the token verification seam.

mod method;
mod outcome;
mod token;

pub use method::{AuthMethod, Credentials};
pub use outcome::{AuthenticationOutcome, FailureReason};
#[cfg(test)]
pub use token::MockTokenVerifier;
pub use token::{TokenClaims, TokenError, TokenVerifier};
