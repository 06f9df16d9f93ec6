//! User administration handlers (admin only).
//!
//! - GET /api/users - List users
//! - GET /api/users/{id} - User with order and key statistics
//! - PUT /api/users/{id}/role - Change role
//! - DELETE /api/users/{id} - Delete user (not oneself)

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    extract::{Json, Path},
    middleware::auth::AuthUser,
    models::user::{Role, UpdateRoleRequest, UserDetailResponse, UserResponse, UserStats},
    response::ApiResponse,
};

/// All users, newest first.
pub async fn list_users(
    State(pool): State<DbPool>,
) -> Result<ApiResponse<Vec<UserResponse>>, AppError> {
    let users = sqlx::query_as::<_, UserResponse>(
        "SELECT id, name, email, role, created_at FROM users ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::list(users))
}

/// One user plus totals over their orders and keys.
pub async fn get_user(
    State(pool): State<DbPool>,
    Path(user_id): Path<Uuid>,
) -> Result<ApiResponse<UserDetailResponse>, AppError> {
    let user = sqlx::query_as::<_, UserResponse>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    let stats = sqlx::query_as::<_, UserStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM orders WHERE user_id = $1) AS total_orders,
            (SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM orders WHERE user_id = $1) AS total_spent,
            (SELECT COUNT(*) FROM api_keys WHERE user_id = $1) AS total_api_keys
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::ok(UserDetailResponse { user, stats }))
}

pub async fn update_user_role(
    State(pool): State<DbPool>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let role = request
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| AppError::validation("Invalid role. Valid values: user, admin"))?;

    let user = sqlx::query_as::<_, UserResponse>(
        "UPDATE users SET role = $1 WHERE id = $2 RETURNING id, name, email, role, created_at",
    )
    .bind(role)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(%user_id, %role, "user role updated");

    Ok(ApiResponse::ok(user).with_message("User role updated successfully"))
}

/// Delete a user together with their orders and keys.
pub async fn delete_user(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    if user_id == auth.id {
        return Err(AppError::validation("Cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(%user_id, deleted_by = %auth.id, "user deleted");

    Ok(ApiResponse::message("User deleted successfully"))
}
