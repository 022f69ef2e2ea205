//! Multi-method credential resolution. Methods are tried in a fixed order
//! and the first success wins; a JWT-specific failure is preserved so the
//! caller can surface the contractual algorithm/brand messages.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AuthError, AuthResult};
use crate::jwt::verify_hs256;

/// Which method authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    SharedSecret,
    BearerJwt,
    ApiKey,
}

/// Credentials extracted from a request. `bearer` is the token with the
/// `Bearer ` prefix already stripped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Credentials<'a> {
    pub admin_key: Option<&'a str>,
    pub bearer: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

impl Credentials<'_> {
    pub fn is_empty(&self) -> bool {
        self.admin_key.is_none() && self.bearer.is_none() && self.api_key.is_none()
    }
}

/// Constant-time string equality. Both sides are hashed first so the compare
/// runs over fixed-length digests and leaks neither content nor length.
pub fn timing_safe_eq(left: &str, right: &str) -> bool {
    let left = Sha256::digest(left.as_bytes());
    let right = Sha256::digest(right.as_bytes());
    left.as_slice().ct_eq(right.as_slice()).into()
}

/// Resolve a request's credentials against a tenant secret.
///
/// Order: shared secret (`adminKey`), bearer HS256 JWT, API key. Each
/// provided method is attempted; the first success wins. When everything
/// fails, a JWT algorithm/brand error takes precedence over the generic
/// secret failure because those messages are part of the contract.
pub fn authenticate(
    tenant_id: &str,
    tenant_secret: &str,
    creds: &Credentials<'_>,
) -> AuthResult<AuthMethod> {
    if creds.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    if let Some(admin_key) = creds.admin_key {
        if timing_safe_eq(admin_key, tenant_secret) {
            return Ok(AuthMethod::SharedSecret);
        }
    }

    let mut jwt_error = None;
    if let Some(token) = creds.bearer {
        match verify_hs256(token, tenant_id, tenant_secret) {
            Ok(_) => return Ok(AuthMethod::BearerJwt),
            Err(err) => jwt_error = Some(err),
        }
    }

    if let Some(api_key) = creds.api_key {
        if timing_safe_eq(api_key, tenant_secret) {
            return Ok(AuthMethod::ApiKey);
        }
    }

    match jwt_error {
        Some(err) => Err(err),
        None => Err(AuthError::InvalidSecret),
    }
}
