//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::api_key::ApiKeyTier;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code. Messages of the
/// client-facing variants are returned verbatim; the two internal variants
/// are logged and replaced with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, ...).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other unexpected failure (hashing, token signing, ...).
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Request body or parameters are invalid. Returns HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Credentials are missing, expired or unknown. Returns HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Credentials are valid but not sufficient. Returns HTTP 403.
    #[error("{0}")]
    Forbidden(String),

    /// Requested resource does not exist or is not visible. Returns HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with existing state. Returns HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// The API key used up its daily quota. Returns HTTP 429.
    #[error("Rate limit exceeded. {tier} tier allows {limit} requests per day.")]
    RateLimited {
        tier: ApiKeyTier,
        limit: i32,
        used: i32,
        reset_at: DateTime<Utc>,
    },
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections are client errors; keep axum's text as the message.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "message": "Human-readable error message"
/// }
/// ```
///
/// Rate limit errors also carry `limit`, `used` and `reset_at`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                json!({ "success": false, "message": "Internal server error" })
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal error");
                json!({ "success": false, "message": "Internal server error" })
            }
            AppError::RateLimited {
                limit,
                used,
                reset_at,
                ..
            } => json!({
                "success": false,
                "message": self.to_string(),
                "limit": limit,
                "used": used,
                "reset_at": reset_at.to_rfc3339(),
            }),
            _ => json!({ "success": false, "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_errors_are_hidden() {
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_rate_limited_body() {
        let reset_at = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let response = AppError::RateLimited {
            tier: ApiKeyTier::Free,
            limit: 100,
            used: 100,
            reset_at,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(
            body["message"],
            "Rate limit exceeded. free tier allows 100 requests per day."
        );
        assert_eq!(body["limit"], 100);
        assert_eq!(body["used"], 100);
        assert_eq!(body["reset_at"], "2025-03-02T00:00:00+00:00");
    }
}
