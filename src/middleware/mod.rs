//! HTTP middleware components.
//!
//! Middleware run before route handlers. Here they authenticate requests,
//! enforce roles and rate limits, and short-circuit unauthorized requests.

/// API key authentication and rate limiting
pub mod api_key;
/// Bearer-token authentication, admin gate and dual authentication
pub mod auth;
