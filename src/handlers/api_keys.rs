//! HTTP handlers for API key management.
//!
//! All routes require a bearer token; keys cannot manage keys.
//!
//! - POST /api/keys/generate - Create a key
//! - GET /api/keys - The caller's keys
//! - GET /api/keys/all - Every key with its owner (admin)
//! - GET /api/keys/{id}/usage - Usage statistics (owner or admin)
//! - PUT /api/keys/{id}/revoke - Deactivate a key (owner or admin)
//! - DELETE /api/keys/{id} - Delete a key (owner or admin)

use axum::{Extension, body::Bytes, extract::State};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::Path,
    middleware::auth::AuthUser,
    models::api_key::{
        ApiKeyResponse, ApiKeyUsage, ApiKeyWithOwner, GenerateApiKeyRequest, GeneratedApiKey,
    },
    response::ApiResponse,
    services::api_key_service,
    state::AppState,
};

/// Generate a key for the caller.
///
/// # Request Body
///
/// ```json
/// {
///   "key_name": "Mobile app",
///   "tier": "premium"
/// }
/// ```
///
/// # Response
///
/// 201 Created. `api_key` holds the plaintext key; it is never shown again.
pub async fn generate_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> Result<ApiResponse<GeneratedApiKey>, AppError> {
    // The body is optional; an empty one means all defaults
    let request: GenerateApiKeyRequest = if body.is_empty() {
        GenerateApiKeyRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))?
    };

    let key = api_key_service::create(&state.pool, auth.id, request).await?;

    Ok(ApiResponse::created("API key generated successfully", key))
}

pub async fn list_my_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<ApiKeyResponse>>, AppError> {
    let keys = api_key_service::list_for_user(&state.pool, auth.id).await?;

    Ok(ApiResponse::list(keys))
}

pub async fn list_all_keys(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<ApiKeyWithOwner>>, AppError> {
    let keys = api_key_service::list_all(&state.pool).await?;

    Ok(ApiResponse::list(keys))
}

pub async fn key_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key_id): Path<Uuid>,
) -> Result<ApiResponse<ApiKeyUsage>, AppError> {
    let usage = api_key_service::usage(
        &state.pool,
        &state.config,
        key_id,
        auth.id,
        auth.is_admin(),
    )
    .await?;

    Ok(ApiResponse::ok(usage))
}

pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key_id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    api_key_service::revoke(&state.pool, key_id, auth.id, auth.is_admin()).await?;

    Ok(ApiResponse::message("API key revoked successfully"))
}

pub async fn delete_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(key_id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    api_key_service::delete(&state.pool, key_id, auth.id, auth.is_admin()).await?;

    Ok(ApiResponse::message("API key deleted successfully"))
}
