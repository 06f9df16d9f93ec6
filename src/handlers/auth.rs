//! Registration, login and profile handlers.
//!
//! - POST /api/auth/register - Create a user account
//! - POST /api/auth/login - Exchange credentials for a bearer token
//! - GET /api/auth/profile - Current user (token required)

use axum::{Extension, extract::State};

use crate::{
    error::AppError,
    extract::Json,
    middleware::auth::AuthUser,
    models::user::{
        LoginRequest, LoginResponse, NewUser, RegisterRequest, User, UserResponse, non_blank,
    },
    response::ApiResponse,
    services::password,
    state::AppState,
};

/// Register a new user with role `user`.
///
/// # Response
///
/// - **201 Created**: the new user (without password hash)
/// - **400**: a field is missing or too long
/// - **409**: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let NewUser {
        name,
        email,
        password,
    } = request.validate()?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;

    if exists {
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = password::hash_password(&password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, 'user')
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| match e {
        // Lost a race against a concurrent registration
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::conflict("Email already registered")
        }
        other => AppError::Database(other),
    })?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok(ApiResponse::created(
        "User registered successfully",
        user.into(),
    ))
}

/// Log in with email and password.
///
/// # Response
///
/// - **200 OK**: `{ token, user }`
/// - **400**: a field is missing
/// - **401**: unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let (Some(email), Some(password)) = (
        non_blank(request.email).map(|e| e.to_lowercase()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(user) if password::verify_password(&password, &user.password_hash)? => user,
        _ => return Err(AppError::unauthorized("Invalid email or password")),
    };

    let token = state.tokens.issue(&user)?;

    Ok(ApiResponse::ok(LoginResponse {
        token,
        user: user.into(),
    })
    .with_message("Login successful"))
}

/// The authenticated user's own record.
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, UserResponse>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(auth.id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(ApiResponse::ok(user))
}
