//! The uniform RPC envelope. Every endpoint, success or failure, responds
//! with exactly one of the three envelope shapes; handlers never leak raw
//! errors across the boundary.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

pub type ApiResult<T> = Result<T, ApiError>;

/// Wire error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadInput,
    NotFound,
    RateLimited,
    Internal,
    Contract,
    Unauthorized,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadInput => "BAD_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Contract => "CONTRACT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
        }
    }

    fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal | ErrorKind::Contract => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A request-terminating error. `message` is the user-visible string from the
/// fixed table; `internal` carries the detail that goes to the diagnostic log
/// and never to the client.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal: Option<String>,
}

impl ApiError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BadInput,
            message: message.into(),
            internal: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: "Not found".to_string(),
            internal: None,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            message: "Too many requests".to_string(),
            internal: None,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: "Internal error".to_string(),
            internal: Some(detail.into()),
        }
    }

    pub fn contract(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Contract,
            message: "Response failed contract validation".to_string(),
            internal: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl From<common_store::StoreError> for ApiError {
    fn from(err: common_store::StoreError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<common_auth::AuthError> for ApiError {
    fn from(err: common_auth::AuthError) -> Self {
        ApiError {
            kind: ErrorKind::BadInput,
            message: err.user_message().to_string(),
            internal: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "ok": false,
            "code": self.kind,
            "message": self.message,
        });
        let mut resp = (self.kind.status(), Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(self.kind.as_str()) {
            resp.headers_mut().insert("X-Error-Code", value);
        }
        resp
    }
}

/// `{ok:true, value}` with an optional ETag.
pub fn ok_value(value: Value, etag: Option<&str>) -> Response {
    let mut body = json!({ "ok": true, "value": value });
    if let Some(etag) = etag {
        body["etag"] = json!(etag);
    }
    Json(body).into_response()
}

/// `{ok:true, notModified:true, etag}`.
pub fn not_modified(etag: &str) -> Response {
    Json(json!({ "ok": true, "notModified": true, "etag": etag })).into_response()
}

/// ETag-aware success: when the client's validator matches, elide the value.
pub fn ok_cached(value: Value, etag: String, if_none_match: Option<&str>) -> Response {
    if if_none_match == Some(etag.as_str()) {
        not_modified(&etag)
    } else {
        ok_value(value, Some(&etag))
    }
}
