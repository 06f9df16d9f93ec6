//! Router assembly.
//!
//! Routes are grouped by the authentication they require; each group gets
//! its middleware through `route_layer` and the groups are merged. Layers
//! added later run first, so the token check wraps the admin gate.

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    handlers::{api_keys, auth, coffees, health, orders, users},
    middleware::{
        api_key::{API_KEY_HEADER, optional_api_key},
        auth::{dual_auth, require_admin, require_token},
    },
    state::AppState,
};

/// Build the full application router.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    // No authentication
    let public = Router::new()
        .route("/", get(health::welcome))
        .route("/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/coffees/categories", get(coffees::list_categories));

    // Public, but an API key is authenticated and counted when present
    let catalogue = Router::new()
        .route("/api/coffees", get(coffees::list_coffees))
        .route("/api/coffees/{id}", get(coffees::get_coffee))
        .route_layer(from_fn_with_state(state.clone(), optional_api_key));

    // Bearer token or API key
    let ordering = Router::new()
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/api/orders/{id}", get(orders::get_order))
        .route_layer(from_fn_with_state(state.clone(), dual_auth));

    // Bearer token
    let account = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/keys", get(api_keys::list_my_keys))
        .route("/api/keys/generate", post(api_keys::generate_key))
        .route("/api/keys/{id}/usage", get(api_keys::key_usage))
        .route("/api/keys/{id}/revoke", put(api_keys::revoke_key))
        .route("/api/keys/{id}", axum::routing::delete(api_keys::delete_key))
        .route_layer(from_fn_with_state(state.clone(), require_token));

    // Bearer token with role admin
    let admin = Router::new()
        .route("/api/coffees", post(coffees::create_coffee))
        .route(
            "/api/coffees/{id}",
            put(coffees::update_coffee).delete(coffees::delete_coffee),
        )
        .route("/api/orders/stats", get(orders::order_stats))
        .route("/api/orders/{id}", put(orders::update_order_status))
        .route("/api/keys/all", get(api_keys::list_all_keys))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/{id}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/api/users/{id}/role", put(users::update_user_role))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_token));

    let app = Router::new()
        .merge(public)
        .merge(catalogue)
        .merge(ordering)
        .merge(account)
        .merge(admin)
        .fallback(health::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

/// CORS for the storefront origin, with credentials.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid CORS_ORIGIN {:?}: {e}", config.cors_origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .allow_credentials(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::Role, models::user::User, services::token_service::TokenService};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state() -> AppState {
        let config: Config = envy::from_iter(vec![
            (
                "DATABASE_URL".to_string(),
                "postgres://localhost/unused".to_string(),
            ),
            ("JWT_SECRET".to_string(), "router-secret".to_string()),
        ])
        .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState::new(pool, config).unwrap()
    }

    fn bearer(role: Role) -> String {
        let user = User {
            id: Uuid::new_v4(),
            name: "Router".to_string(),
            email: "router@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        };
        let token = TokenService::new("router-secret", Duration::from_secs(60))
            .issue(&user)
            .unwrap();
        format!("Bearer {token}")
    }

    async fn call(method: Method, uri: &str, auth: Option<String>) -> (StatusCode, serde_json::Value) {
        send(method, uri, auth, None).await
    }

    async fn call_json(
        method: Method,
        uri: &str,
        auth: Option<String>,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        send(method, uri, auth, Some(body.to_string())).await
    }

    async fn send(
        method: Method,
        uri: &str,
        auth: Option<String>,
        json: Option<String>,
    ) -> (StatusCode, serde_json::Value) {
        let app = build_router(test_state()).unwrap();
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let body = match json {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_welcome() {
        let (status, body) = call(Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["endpoints"]["orders"], "/api/orders");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_envelope() {
        let (status, body) = call(Method::GET, "/api/teapots", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_order_status_update_requires_admin() {
        let uri = format!("/api/orders/{}", Uuid::new_v4());

        let (status, _) = call(Method::PUT, &uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(Method::PUT, &uri, Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");
    }

    #[tokio::test]
    async fn test_order_stats_requires_admin() {
        let (status, _) = call(Method::GET, "/api/orders/stats", Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_orders_require_credentials() {
        let (status, body) = call(Method::GET, "/api/orders", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["message"],
            "Authentication required. Provide either JWT token or API key."
        );
    }

    #[tokio::test]
    async fn test_coffee_admin_routes_are_gated() {
        let (status, _) = call(Method::POST, "/api/coffees", Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/coffees/{}", Uuid::new_v4());
        let (status, _) = call(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_key_routes_require_token() {
        let (status, body) = call(Method::GET, "/api/keys", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access token required");

        let (status, _) = call(Method::GET, "/api/keys/all", Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_users_admin_only() {
        let (status, _) = call(Method::GET, "/api/users", Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_size_is_enveloped_bad_request() {
        let body = format!(
            r#"{{"coffee_id":"{}","quantity":1,"size":"medium"}}"#,
            Uuid::new_v4()
        );
        let (status, body) =
            call_json(Method::POST, "/api/orders", Some(bearer(Role::User)), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("medium"));
    }

    #[tokio::test]
    async fn test_truncated_json_is_enveloped_bad_request() {
        let (status, body) = call_json(
            Method::POST,
            "/api/orders",
            Some(bearer(Role::User)),
            r#"{"coffee_id":"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_non_uuid_id_is_enveloped_bad_request() {
        let (status, body) =
            call(Method::GET, "/api/orders/not-a-uuid", Some(bearer(Role::User))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_generate_key_rejects_malformed_body() {
        let (status, body) = call_json(
            Method::POST,
            "/api/keys/generate",
            Some(bearer(Role::User)),
            "not json",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid JSON body")
        );
    }

    #[tokio::test]
    async fn test_bad_cors_origin_rejected() {
        let mut state = test_state();
        let mut config = (*state.config).clone();
        config.cors_origin = "bad\norigin".to_string();
        state.config = std::sync::Arc::new(config);
        assert!(build_router(state).is_err());
    }
}
