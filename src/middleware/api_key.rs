//! API key authentication and rate limiting middleware.
//!
//! This middleware intercepts requests carrying `X-API-Key` to:
//! 1. Hash the key and find a matching active record
//! 2. Count the request against the key's daily quota (429 when exhausted)
//! 3. Inject [`ApiKeyContext`] and [`Caller`] into the request
//! 4. Append a usage log entry once the handler has produced a response
//!
//! Responses to key-authenticated requests carry `X-RateLimit-Limit` and
//! `X-RateLimit-Remaining`.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header::USER_AGENT},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::Caller,
    models::api_key::ApiKeyTier,
    services::{api_key_service, rate_limiter},
    state::AppState,
};

pub const API_KEY_HEADER: &str = "x-api-key";

const IP_MAX_CHARS: usize = 64;

/// Context attached to requests authenticated by API key.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub api_key_id: Uuid,

    /// Owner of the key; requests act on this user's behalf
    pub user_id: Uuid,

    pub tier: ApiKeyTier,

    /// Requests counted today, including this one
    pub requests_today: i32,

    /// Daily quota of the key's tier
    pub limit: i32,
}

/// Authenticate by API key, count the request and log it.
pub(crate) async fn run_with_api_key(
    state: &AppState,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("API key required. Include X-API-Key header."))?;

    let key = api_key_service::find_active(&state.pool, presented)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or revoked API key"))?;

    let limit = state.config.daily_limit(key.tier);
    let requests_today = rate_limiter::consume(&state.pool, &key, limit, Utc::now()).await?;

    let context = ApiKeyContext {
        api_key_id: key.id,
        user_id: key.user_id,
        tier: key.tier,
        requests_today,
        limit,
    };

    let endpoint = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();
    let ip_address = client_ip(&request);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("Unknown")
        .to_string();

    tracing::debug!(
        api_key_id = %context.api_key_id,
        tier = %context.tier,
        used = context.requests_today,
        limit = context.limit,
        "api key authenticated"
    );

    let remaining = (context.limit - context.requests_today).max(0);

    request
        .extensions_mut()
        .insert(Caller::ApiKey(context.clone()));
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));

    // A failed log write must not fail the request it describes
    if let Err(e) = rate_limiter::record_usage(
        &state.pool,
        key.id,
        &endpoint,
        &method,
        response.status().as_u16(),
        ip_address.as_deref(),
        &user_agent,
    )
    .await
    {
        tracing::error!(api_key_id = %key.id, error = %e, "failed to record api usage");
    }

    Ok(response)
}

/// Peer address, preferring the first `X-Forwarded-For` hop.
fn client_ip(request: &Request) -> Option<String> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().chars().take(IP_MAX_CHARS).collect::<String>())
        .filter(|ip| !ip.is_empty());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

/// Public routes that also accept an API key.
///
/// Without `X-API-Key` the request continues anonymously; with one, the key
/// is authenticated and rate limited like any API key request.
pub async fn optional_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(API_KEY_HEADER) {
        return Ok(next.run(request).await);
    }

    run_with_api_key(&state, request, next).await
}
