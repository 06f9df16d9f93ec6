//! API Key model for authentication and rate limiting.
//!
//! API keys let third-party clients call the order API on behalf of their
//! owner. They are stored in the database as SHA-256 hashes; the plaintext
//! key is shown once, when it is generated.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::check_max_chars};

pub const KEY_NAME_MAX_CHARS: usize = 100;
const DEFAULT_KEY_NAME: &str = "My API Key";

/// Service level of an API key, controlling its daily quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "api_key_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyTier {
    #[default]
    Free,
    Premium,
}

impl ApiKeyTier {
    /// Parse a requested tier; anything unrecognised falls back to `Free`.
    pub fn parse_or_free(value: Option<&str>) -> Self {
        match value {
            Some("premium") => ApiKeyTier::Premium,
            _ => ApiKeyTier::Free,
        }
    }
}

impl fmt::Display for ApiKeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeyTier::Free => f.write_str("free"),
            ApiKeyTier::Premium => f.write_str("premium"),
        }
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `user_id`: Owner of the key
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `key_prefix`: Leading characters of the key, for display
/// - `tier`, `requests_today`, `last_request_date`: rate limiting state
/// - `is_active`, `revoked_at`: revocation state
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    ///
    /// When a request comes in with "X-API-Key: bbt_abc123", we:
    /// 1. Hash "bbt_abc123" with SHA-256
    /// 2. Look up this hash in the database
    /// 3. If found and active, authenticate the request
    pub key_hash: String,

    pub key_prefix: String,
    pub key_name: String,
    pub tier: ApiKeyTier,

    /// Inactive keys are rejected during authentication.
    pub is_active: bool,

    /// Requests counted on `last_request_date`
    pub requests_today: i32,
    pub last_request_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /api/keys/generate`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateApiKeyRequest {
    /// Defaults to "My API Key"
    pub key_name: Option<String>,

    /// `free` or `premium`; anything else becomes `free`
    pub tier: Option<String>,
}

impl GenerateApiKeyRequest {
    /// Trimmed key name, or the default when absent or blank.
    pub fn key_name(&self) -> Result<String, AppError> {
        let name = self
            .key_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_KEY_NAME);
        check_max_chars("Key name", name, KEY_NAME_MAX_CHARS)?;
        Ok(name.to_string())
    }
}

/// Response body for a freshly generated key. The only response that ever
/// contains the plaintext key.
#[derive(Debug, Serialize)]
pub struct GeneratedApiKey {
    pub id: Uuid,
    pub api_key: String,
    pub key_name: String,
    pub tier: ApiKeyTier,
    pub created_at: DateTime<Utc>,
}

/// Public view of an API key.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_prefix: String,
    pub key_name: String,
    pub tier: ApiKeyTier,
    pub is_active: bool,
    pub requests_today: i32,
    pub last_request_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            user_id: key.user_id,
            key_prefix: key.key_prefix,
            key_name: key.key_name,
            tier: key.tier,
            is_active: key.is_active,
            requests_today: key.requests_today,
            last_request_date: key.last_request_date,
            created_at: key.created_at,
            revoked_at: key.revoked_at,
        }
    }
}

/// Row of the admin key listing: key columns plus owner details.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiKeyWithOwner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_prefix: String,
    pub key_name: String,
    pub tier: ApiKeyTier,
    pub is_active: bool,
    pub requests_today: i32,
    pub last_request_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_name: String,
    pub user_email: String,
}

/// A single entry of the append-only `api_usage_logs` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiUsageLog {
    pub id: i64,
    pub api_key_id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Response body for `GET /api/keys/{id}/usage`.
#[derive(Debug, Serialize)]
pub struct ApiKeyUsage {
    pub key: ApiKeyResponse,
    pub daily_limit: i32,
    pub total_requests: i64,
    pub recent_logs: Vec<ApiUsageLog>,
}
