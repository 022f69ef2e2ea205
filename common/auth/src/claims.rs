use serde::{Deserialize, Serialize};

/// Payload of a tenant-scoped HS256 token. `brand` must equal the tenant the
/// request resolves to; `exp`/`nbf` are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandClaims {
    pub brand: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl BrandClaims {
    pub fn new(brand: impl Into<String>, exp: i64) -> Self {
        Self {
            brand: brand.into(),
            exp,
            nbf: None,
            iat: None,
            sub: None,
        }
    }
}
