//! Error handling for the token lifecycle
//!
//! `TokenError` is what the core returns. Every failure path has its own
//! variant so callers can branch on it. The HTTP mapping lives at the
//! bottom of this file and is the only place status codes are chosen.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

// ============================================================================
// 1. CORE ERROR TYPE
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// A required request field was missing or empty
    #[error("missing or empty field: {0}")]
    MalformedRequest(&'static str),
    #[error("failed to sign access token: {0}")]
    SigningFailure(String),
    #[error("secure random source unavailable: {0}")]
    RandomSourceFailure(String),
    #[error("refresh token storage failed: {0}")]
    StorageFailure(String),
    /// Presented refresh token is unknown, mismatched or already rotated
    #[error("refresh token is invalid")]
    InvalidToken,
    /// No refresh token record exists for the user being rotated
    #[error("no refresh token record for user")]
    NotFound,
    #[error("access token has expired")]
    Expired,
    #[error("access token signature is invalid")]
    InvalidSignature,
}

impl TokenError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::MalformedRequest(_) => "MALFORMED_REQUEST",
            TokenError::SigningFailure(_) => "SIGNING_FAILURE",
            TokenError::RandomSourceFailure(_) => "RANDOM_SOURCE_FAILURE",
            TokenError::StorageFailure(_) => "STORAGE_FAILURE",
            TokenError::InvalidToken => "INVALID_TOKEN",
            TokenError::NotFound => "NOT_FOUND",
            TokenError::Expired => "TOKEN_EXPIRED",
            TokenError::InvalidSignature => "INVALID_SIGNATURE",
        }
    }

    /// Message safe to show to the end user. Internal detail stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            TokenError::MalformedRequest(_) => "Missing required parameters",
            TokenError::SigningFailure(_) | TokenError::RandomSourceFailure(_) => {
                "Token generation failed"
            }
            TokenError::StorageFailure(_) => "Token could not be saved",
            TokenError::InvalidToken => "Token is invalid",
            TokenError::NotFound => "Token could not be updated",
            TokenError::Expired | TokenError::InvalidSignature => "Invalid or expired token",
        }
    }
}

// ============================================================================
// 2. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID, also present in the matching log line
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for TokenError {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let response = ErrorResponse::new(
            error_id.to_string(),
            self.user_message().to_string(),
            self.code().to_string(),
            status.as_u16(),
        );
        (status, response)
    }

    fn log_error(&self, error_id: &str) {
        match self {
            TokenError::MalformedRequest(_)
            | TokenError::InvalidToken
            | TokenError::NotFound
            | TokenError::Expired
            | TokenError::InvalidSignature => {
                tracing::warn!(
                    error_id = error_id,
                    code = self.code(),
                    error = %self,
                    "Token request rejected"
                );
            }
            TokenError::SigningFailure(_)
            | TokenError::RandomSourceFailure(_)
            | TokenError::StorageFailure(_) => {
                tracing::error!(
                    error_id = error_id,
                    code = self.code(),
                    error = %self,
                    "Token request failed"
                );
            }
        }
    }
}

impl ResponseError for TokenError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &error_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            TokenError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            TokenError::InvalidToken | TokenError::Expired | TokenError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            TokenError::NotFound => StatusCode::NOT_FOUND,
            TokenError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            TokenError::SigningFailure(_) | TokenError::RandomSourceFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ============================================================================
// 3. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context attached to log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &TokenError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            user_id = ?self.user_id,
            code = error.code(),
            "Token operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TokenError::MalformedRequest("ip").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(TokenError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(TokenError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(TokenError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            TokenError::StorageFailure("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            TokenError::SigningFailure("bad key".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = TokenError::StorageFailure("connection refused at 10.1.2.3".to_string());
        assert!(!err.user_message().contains("10.1.2.3"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_response_creation() {
        let (status, response) =
            ErrorHandler::error_response(&TokenError::InvalidToken, "test-123");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error_id, "test-123");
        assert_eq!(response.code, "INVALID_TOKEN");
        assert_eq!(response.status, 401);
    }

    #[test]
    fn test_malformed_request_names_field() {
        let err = TokenError::MalformedRequest("user_id");
        assert_eq!(err.to_string(), "missing or empty field: user_id");
        assert_eq!(err.code(), "MALFORMED_REQUEST");
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("token_refresh");
        assert_eq!(ctx.operation, "token_refresh");
        assert!(ctx.user_id.is_none());

        let ctx = ctx.with_user_id("42".to_string());
        assert_eq!(ctx.user_id, Some("42".to_string()));
    }
}
