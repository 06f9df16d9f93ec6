//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Performs business logic directly or through a service
//! 3. Returns the JSON envelope or an `AppError`

/// API key management endpoints
pub mod api_keys;
/// Registration, login and profile
pub mod auth;
/// Coffee catalogue endpoints
pub mod coffees;
/// Health check, welcome and fallback
pub mod health;
/// Order endpoints
pub mod orders;
/// User administration endpoints
pub mod users;
