//! Bearer-token authentication, the admin gate and dual authentication.
//!
//! Token middleware flow:
//! 1. Extract the token from `Authorization: Bearer <token>`
//! 2. Verify signature and expiry
//! 3. Inject [`AuthUser`] and [`Caller`] into the request
//! 4. Reject unauthenticated requests with 401 (403 for a bad token)

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::api_key::{self, API_KEY_HEADER, ApiKeyContext},
    models::user::Role,
    services::{order_service::OrderScope, token_service::TokenError},
    state::AppState,
};

/// A user authenticated by bearer token.
///
/// Route handlers extract this using `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Whoever made the request, by token or by API key.
///
/// Inserted by every authenticating middleware so that handlers shared by
/// both schemes can extract `Extension<Caller>`.
#[derive(Debug, Clone)]
pub enum Caller {
    User(AuthUser),
    ApiKey(ApiKeyContext),
}

impl Caller {
    /// The user on whose behalf the request acts (the key owner for API keys).
    pub fn user_id(&self) -> Uuid {
        match self {
            Caller::User(user) => user.id,
            Caller::ApiKey(key) => key.user_id,
        }
    }

    /// API keys never carry admin rights.
    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::User(user) if user.is_admin())
    }

    pub fn order_scope(&self) -> OrderScope {
        if self.is_admin() {
            OrderScope::All
        } else {
            OrderScope::User(self.user_id())
        }
    }
}

/// Validate the bearer token in `headers`.
///
/// # Errors
///
/// - 401 "Access token required" when the header is missing
/// - 401 "Invalid token format" when it has no token part
/// - 401 "Token expired"
/// - 403 "Invalid token" for any other verification failure
pub fn authenticate_token(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Access token required"))?;

    // Expected format: "Bearer <token>"
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.split_whitespace().nth(1))
        .ok_or_else(|| AppError::unauthorized("Invalid token format"))?;

    let claims = state.tokens.verify(token).map_err(|e| match e {
        TokenError::Expired => AppError::unauthorized(e.to_string()),
        TokenError::Invalid => AppError::forbidden(e.to_string()),
    })?;

    Ok(AuthUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

/// Bearer-token authentication middleware.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_token(&state, request.headers())?;

    request.extensions_mut().insert(Caller::User(user.clone()));
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Admin gate. Must run after [`require_token`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    if !user.is_admin() {
        tracing::debug!(user_id = %user.id, email = %user.email, "non-admin caller refused");
        return Err(AppError::forbidden("Admin access required"));
    }

    Ok(next.run(request).await)
}

/// Accept either credential, preferring the bearer token.
///
/// - `Authorization` present: token authentication
/// - else `X-API-Key` present: API key authentication (rate limited)
/// - else 401
pub async fn dual_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.headers().contains_key(AUTHORIZATION) {
        return require_token(State(state), request, next).await;
    }

    if request.headers().contains_key(API_KEY_HEADER) {
        return api_key::run_with_api_key(&state, request, next).await;
    }

    Err(AppError::unauthorized(
        "Authentication required. Provide either JWT token or API key.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, models::user::User};
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
    };
    use chrono::Utc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config: Config = envy::from_iter(vec![
            (
                "DATABASE_URL".to_string(),
                "postgres://localhost/unused".to_string(),
            ),
            ("JWT_SECRET".to_string(), "test-secret".to_string()),
        ])
        .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState::new(pool, config).unwrap()
    }

    fn token_for(state: &AppState, role: Role) -> (Uuid, String) {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        };
        (user.id, state.tokens.issue(&user).unwrap())
    }

    async fn whoami(Extension(caller): Extension<Caller>) -> String {
        caller.user_id().to_string()
    }

    fn app(state: AppState) -> Router {
        let protected = Router::new()
            .route("/me", get(whoami))
            .route_layer(from_fn_with_state(state.clone(), require_token));
        let admin = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(from_fn(require_admin))
            .route_layer(from_fn_with_state(state.clone(), require_token));
        let dual = Router::new()
            .route("/dual", get(whoami))
            .route_layer(from_fn_with_state(state.clone(), dual_auth));

        protected.merge(admin).merge(dual).with_state(state)
    }

    async fn send(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (status, body) = send(app(test_state()), "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Access token required"));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let (status, body) = send(app(test_state()), "/me", Some("Bearer")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid token format"));
    }

    #[tokio::test]
    async fn test_bad_signature_is_forbidden() {
        let (status, body) = send(app(test_state()), "/me", Some("Bearer abc.def.ghi")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Invalid token"));
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let state = test_state();
        let (id, token) = token_for(&state, Role::User);

        let (status, body) = send(app(state), "/me", Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, id.to_string());
    }

    #[tokio::test]
    async fn test_admin_gate() {
        let state = test_state();
        let (_, user_token) = token_for(&state, Role::User);
        let (_, admin_token) = token_for(&state, Role::Admin);

        let (status, body) = send(
            app(state.clone()),
            "/admin",
            Some(&format!("Bearer {user_token}")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Admin access required"));

        let (status, _) = send(app(state), "/admin", Some(&format!("Bearer {admin_token}"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dual_requires_some_credential() {
        let (status, body) = send(app(test_state()), "/dual", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Provide either JWT token or API key"));
    }

    #[tokio::test]
    async fn test_dual_prefers_token() {
        let state = test_state();
        let (id, token) = token_for(&state, Role::User);

        let (status, body) = send(app(state), "/dual", Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, id.to_string());
    }

    #[test]
    fn test_caller_scope() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "u@example.com".to_string(),
            role: Role::User,
        };
        let admin = AuthUser {
            role: Role::Admin,
            ..user.clone()
        };
        let key = ApiKeyContext {
            api_key_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tier: crate::models::api_key::ApiKeyTier::Premium,
            requests_today: 1,
            limit: 1000,
        };

        assert_eq!(Caller::User(user.clone()).order_scope(), OrderScope::User(user.id));
        assert_eq!(Caller::User(admin).order_scope(), OrderScope::All);
        assert_eq!(
            Caller::ApiKey(key.clone()).order_scope(),
            OrderScope::User(key.user_id)
        );
        assert!(!Caller::ApiKey(key).is_admin());
    }
}
