use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials provided")]
    MissingCredentials,
    #[error("secret comparison failed")]
    InvalidSecret,
    #[error("token declares a non-HS256 algorithm")]
    InvalidAlgorithm,
    #[error("token brand does not match tenant")]
    BrandMismatch,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("origin not allowed: {0}")]
    OriginRejected(String),
}

impl AuthError {
    /// The string shown to clients. Internal detail stays in the diagnostic
    /// log; only the algorithm and brand failures are specific by contract.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidAlgorithm => "Invalid JWT algorithm",
            AuthError::BrandMismatch => "Token brand mismatch",
            AuthError::OriginRejected(_) => "Request origin not allowed",
            _ => "Invalid authentication credentials",
        }
    }
}
