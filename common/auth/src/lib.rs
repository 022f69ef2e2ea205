//! Tenant authentication: shared secret, bearer HS256 JWT and API key, tried
//! in that order. Secret comparisons are constant-time; JWT verification pins
//! the algorithm before any signature work.

pub mod claims;
pub mod error;
pub mod jwt;
pub mod origin;
pub mod resolver;

pub use claims::BrandClaims;
pub use error::{AuthError, AuthResult};
pub use jwt::{sign_hs256, verify_hs256};
pub use origin::check_origin;
pub use resolver::{authenticate, timing_safe_eq, AuthMethod, Credentials};
