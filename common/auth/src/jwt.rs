//! HS256 token mint and verification.
//!
//! Verification peeks at the raw header before any cryptographic work: the
//! declared algorithm must be exactly `HS256`, so `none` and RSA-downgrade
//! tokens are rejected up front with a distinct error. The signature check
//! itself (HMAC-SHA-256 over `header.payload`, base64url) is delegated to
//! `jsonwebtoken`, which compares constant-time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::BrandClaims;
use crate::error::{AuthError, AuthResult};

/// Mint a signed HS256 token for a tenant secret.
pub fn sign_hs256(claims: &BrandClaims, secret: &str) -> AuthResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AuthError::Verification(err.to_string()))
}

/// Verify a bearer token against a tenant and its secret.
///
/// Checks, in order: declared algorithm is HS256; signature is valid;
/// `exp > now` and `nbf <= now` (no leeway); `brand` equals `tenant_id`.
pub fn verify_hs256(token: &str, tenant_id: &str, secret: &str) -> AuthResult<BrandClaims> {
    require_hs256_header(token)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_nbf = true;

    let data = decode::<BrandClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(map_decode_error)?;

    if data.claims.brand != tenant_id {
        return Err(AuthError::BrandMismatch);
    }
    Ok(data.claims)
}

/// Parse the JOSE header ourselves so that `alg: none` (which `jsonwebtoken`
/// cannot even represent) still maps to the algorithm error.
fn require_hs256_header(token: &str) -> AuthResult<()> {
    let header_b64 = token
        .split('.')
        .next()
        .ok_or_else(|| AuthError::Malformed("empty token".to_string()))?;
    let raw = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|err| AuthError::Malformed(err.to_string()))?;
    let header: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|err| AuthError::Malformed(err.to_string()))?;
    match header.get("alg").and_then(|v| v.as_str()) {
        Some("HS256") => Ok(()),
        Some(_) => Err(AuthError::InvalidAlgorithm),
        None => Err(AuthError::Malformed("header missing alg".to_string())),
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        ErrorKind::InvalidSignature => AuthError::InvalidSecret,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::Malformed(err.to_string())
        }
        _ => AuthError::Verification(err.to_string()),
    }
}
