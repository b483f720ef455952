//! Authentication infrastructure module
//!
//! Bearer token verification and strategy resolution.

mod jwt;
mod resolver;

pub use jwt::{JwtClaims, JwtConfig, JwtTokenVerifier};
pub use resolver::AuthResolver;
