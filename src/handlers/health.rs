//! Health check and welcome endpoints.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{db::DbPool, error::AppError};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,

    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "success": true,
///   "status": "healthy",
///   "database": "connected",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// If the database is unreachable, returns the standard 500 error body.
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        database: "connected".to_string(),
        timestamp: Utc::now(),
    }))
}

/// `GET /` - service name, version and the resource roots.
pub async fn welcome() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to BeanByte Open API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "coffees": "/api/coffees",
            "orders": "/api/orders",
            "apiKeys": "/api/keys",
            "users": "/api/users"
        }
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::not_found("Endpoint not found")
}
