use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes an evaluation backend may put in a JSON error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 | 409 | 422 => ErrorCode::Validation,
            429 => ErrorCode::RateLimited,
            _ => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Best-effort decode of a backend error body; falls back to the raw text.
    pub fn from_body(status: u16, body: &str) -> Self {
        serde_json::from_str::<ApiError>(body).unwrap_or_else(|_| {
            let message = body.trim();
            let message = if message.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {message}")
            };
            ApiError::new(ErrorCode::from_http_status(status), message)
        })
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_structured_error_body() {
        let err = ApiError::from_body(404, r#"{"code":"not_found","message":"no such evaluation"}"#);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "no such evaluation");
    }

    #[test]
    fn falls_back_to_status_for_plain_bodies() {
        let err = ApiError::from_body(503, "upstream down\n");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "HTTP 503: upstream down");

        let err = ApiError::from_body(429, "");
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert_eq!(err.message, "HTTP 429");
    }
}
