//! Error type system for Grimoire
//!
//! This module provides the error type used across the service with:
//! - HTTP status code mapping
//! - JSON error responses carrying a trace ID
//! - Automatic conversion into Axum responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Main error type for the Grimoire system
#[derive(Debug, thiserror::Error)]
pub enum GrimoireError {
    // Client errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Duplicate rating: {0}")]
    DuplicateRating(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Image error: {0}")]
    Image(String),

    // Storage and system errors
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GrimoireError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            GrimoireError::Validation(_)
            | GrimoireError::DuplicateRating(_)
            | GrimoireError::Image(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            GrimoireError::Authentication(_) => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            GrimoireError::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            GrimoireError::NotFound(_) => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            // A unique-constraint conflict surfaces as a persistence error
            // on the wire, matching the signup contract.
            GrimoireError::Conflict(_)
            | GrimoireError::Database(_)
            | GrimoireError::Io(_)
            | GrimoireError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            GrimoireError::Validation(_) => "ValidationError",
            GrimoireError::NotFound(_) => "NotFoundError",
            GrimoireError::Forbidden(_) => "ForbiddenError",
            GrimoireError::DuplicateRating(_) => "DuplicateRatingError",
            GrimoireError::Authentication(_) => "AuthenticationError",
            GrimoireError::Image(_) => "ImageError",
            GrimoireError::Conflict(_) => "ConflictError",
            GrimoireError::Database(_) => "DatabaseError",
            GrimoireError::Io(_) => "IoError",
            GrimoireError::Internal(_) => "InternalError",
        }
    }
}

/// Error response structure for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique trace ID for this error
    pub trace_id: String,
}

impl ErrorResponse {
    /// Create a new error response with a generated trace ID
    pub fn new(error: String, message: String) -> Self {
        Self {
            error,
            message,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an error response from a GrimoireError
    pub fn from_error(error: &GrimoireError) -> Self {
        Self::new(error.error_type().to_string(), error.to_string())
    }
}

/// Implement IntoResponse for GrimoireError to enable automatic error handling in Axum
impl IntoResponse for GrimoireError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = ErrorResponse::from_error(&self);

        // Log the error with trace ID
        tracing::error!(
            error_type = self.error_type(),
            trace_id = %error_response.trace_id,
            status_code = %status_code,
            "Request failed: {}",
            self
        );

        (status_code, Json(error_response)).into_response()
    }
}

/// Result type alias for operations that can fail with GrimoireError
pub type Result<T> = std::result::Result<T, GrimoireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GrimoireError::Validation("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GrimoireError::DuplicateRating("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GrimoireError::Authentication("test".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GrimoireError::Forbidden("test".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GrimoireError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GrimoireError::Conflict("test".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GrimoireError::Database(rusqlite::Error::InvalidQuery).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            GrimoireError::Validation("test".into()).error_type(),
            "ValidationError"
        );
        assert_eq!(
            GrimoireError::DuplicateRating("test".into()).error_type(),
            "DuplicateRatingError"
        );
        assert_eq!(
            GrimoireError::Forbidden("test".into()).error_type(),
            "ForbiddenError"
        );
    }

    #[test]
    fn test_error_response_creation() {
        let error = GrimoireError::NotFound("book 42".into());
        let response = ErrorResponse::from_error(&error);

        assert_eq!(response.error, "NotFoundError");
        assert!(response.message.contains("book 42"));
        assert!(!response.trace_id.is_empty());
    }
}
