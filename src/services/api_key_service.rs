//! API key issuance, lookup and lifecycle.
//!
//! Keys look like `bbt_` followed by 32 hex characters (16 random bytes).
//! Only the SHA-256 hash and a short display prefix are persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::api_key::{
        ApiKey, ApiKeyResponse, ApiKeyTier, ApiKeyUsage, ApiKeyWithOwner, ApiUsageLog,
        GenerateApiKeyRequest, GeneratedApiKey,
    },
};

const KEY_PREFIX: &str = "bbt_";
const DISPLAY_PREFIX_LEN: usize = 12;
const RECENT_LOG_LIMIT: i64 = 50;

/// Generate a fresh plaintext key.
pub fn generate_key() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

/// SHA-256 of the key, hex encoded. This is what the database stores.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn display_prefix(key: &str) -> String {
    key.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// Look up an active key by its plaintext value.
pub async fn find_active(pool: &DbPool, key: &str) -> Result<Option<ApiKey>, AppError> {
    let record = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE key_hash = $1 AND is_active = true",
    )
    .bind(hash_key(key))
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create a key for `user_id`.
///
/// # Returns
///
/// The stored key together with its plaintext value (the only time it is
/// available).
pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    request: GenerateApiKeyRequest,
) -> Result<GeneratedApiKey, AppError> {
    let key_name = request.key_name()?;
    let tier = ApiKeyTier::parse_or_free(request.tier.as_deref());

    let plaintext = generate_key();

    let record = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (user_id, key_hash, key_prefix, key_name, tier, is_active)
        VALUES ($1, $2, $3, $4, $5, true)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(hash_key(&plaintext))
    .bind(display_prefix(&plaintext))
    .bind(&key_name)
    .bind(tier)
    .fetch_one(pool)
    .await?;

    tracing::info!(api_key_id = %record.id, %user_id, %tier, "api key generated");

    Ok(GeneratedApiKey {
        id: record.id,
        api_key: plaintext,
        key_name: record.key_name,
        tier: record.tier,
        created_at: record.created_at,
    })
}

/// Keys owned by `user_id`, newest first.
pub async fn list_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<ApiKeyResponse>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(keys.into_iter().map(Into::into).collect())
}

/// Every key in the system with its owner, newest first.
pub async fn list_all(pool: &DbPool) -> Result<Vec<ApiKeyWithOwner>, AppError> {
    let keys = sqlx::query_as::<_, ApiKeyWithOwner>(
        r#"
        SELECT k.id, k.user_id, k.key_prefix, k.key_name, k.tier, k.is_active,
               k.requests_today, k.last_request_date, k.created_at, k.revoked_at,
               u.name AS user_name, u.email AS user_email
        FROM api_keys k
        JOIN users u ON u.id = k.user_id
        ORDER BY k.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Fetch a key visible to the caller: their own, or any key for admins.
async fn find_visible(
    pool: &DbPool,
    key_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<ApiKey, AppError> {
    sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1 AND (user_id = $2 OR $3)")
        .bind(key_id)
        .bind(user_id)
        .bind(is_admin)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("API key not found"))
}

/// Usage statistics for one key.
pub async fn usage(
    pool: &DbPool,
    config: &Config,
    key_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<ApiKeyUsage, AppError> {
    let key = find_visible(pool, key_id, user_id, is_admin).await?;

    let total_requests: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_usage_logs WHERE api_key_id = $1")
            .bind(key.id)
            .fetch_one(pool)
            .await?;

    let recent_logs = sqlx::query_as::<_, ApiUsageLog>(
        r#"
        SELECT * FROM api_usage_logs
        WHERE api_key_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(key.id)
    .bind(RECENT_LOG_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(ApiKeyUsage {
        daily_limit: config.daily_limit(key.tier),
        key: key.into(),
        total_requests,
        recent_logs,
    })
}

/// Deactivate a key. It stays listed but can no longer authenticate.
pub async fn revoke(
    pool: &DbPool,
    key_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE api_keys
        SET is_active = false, revoked_at = COALESCE(revoked_at, NOW())
        WHERE id = $1 AND (user_id = $2 OR $3)
        "#,
    )
    .bind(key_id)
    .bind(user_id)
    .bind(is_admin)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("API key not found"));
    }

    tracing::info!(api_key_id = %key_id, "api key revoked");
    Ok(())
}

/// Remove a key and its usage log.
pub async fn delete(
    pool: &DbPool,
    key_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND (user_id = $2 OR $3)")
        .bind(key_id)
        .bind(user_id)
        .bind(is_admin)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("API key not found"));
    }

    Ok(())
}
