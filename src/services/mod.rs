//! Business logic services.
//!
//! Services contain logic shared by handlers and middleware: database
//! transactions, rate limiting, credentials and tokens.

pub mod api_key_service;
pub mod order_service;
pub mod password;
pub mod rate_limiter;
pub mod token_service;
