/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; an `ApiError` renders itself as a JSON
/// body with a matching status code.
///
/// # Response format
///
/// ```json
/// {
///   "error": "validation_error",
///   "message": "Request validation failed",
///   "details": ["Email has already been taken"]
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use latchkey_shared::{auth::jwt::JwtError, service::AuthError};
use serde::{Deserialize, Serialize};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unprocessable entity (422) with full validation messages
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<String>),

    /// Internal server error (500); the detail is logged, never returned
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Validation messages, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::ValidationError(messages) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(messages),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Default mapping for orchestrator failures
///
/// Rejections become 401 (422 for validation); handlers that need another
/// status for a particular rejection map it before falling back to this.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(messages) => ApiError::ValidationError(messages),
            rejection if rejection.is_rejection() => ApiError::Unauthorized(rejection.to_string()),
            internal => ApiError::InternalError(internal.to_string()),
        }
    }
}

/// Convert access token errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encode(msg) => ApiError::InternalError(msg),
            rejected => ApiError::Unauthorized(rejected.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid refresh token".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid refresh token");

        let err = ApiError::ValidationError(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            ApiError::from(AuthError::InvalidCredentials),
            ApiError::Unauthorized(msg) if msg == "Invalid email or password"
        ));
        assert!(matches!(
            ApiError::from(AuthError::TokenRevoked),
            ApiError::Unauthorized(msg) if msg == "Token revoked"
        ));
        assert!(matches!(
            ApiError::from(AuthError::Validation(vec!["Email is invalid".into()])),
            ApiError::ValidationError(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::Token(JwtError::Encode("boom".into()))),
            ApiError::InternalError(_)
        ));
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(
            ApiError::from(JwtError::Expired),
            ApiError::Unauthorized(msg) if msg == "Token has expired"
        ));
        assert!(matches!(
            ApiError::from(JwtError::Malformed("bad".into())),
            ApiError::Unauthorized(msg) if msg == "Invalid token"
        ));
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::InternalError("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "An internal error occurred");
    }
}
