//! Daily per-key request quota.
//!
//! Every API key carries a `requests_today` counter and the date it was last
//! used. On a new (UTC) day the counter starts over; once it reaches the
//! tier's limit, further requests are refused until midnight.
//!
//! The decision itself is [`evaluate`], a pure function; [`consume`] applies
//! it to the stored row.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, ApiKeyTier},
};

/// Outcome of checking a key's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request may proceed. `used` is the count including this request,
    /// `reset` is set when the stored counter belongs to an earlier day.
    Allow { used: i32, reset: bool },

    /// Quota exhausted for today.
    Reject { used: i32 },
}

/// Decide whether one more request fits into today's quota.
pub fn evaluate(
    requests_today: i32,
    last_request_date: Option<NaiveDate>,
    today: NaiveDate,
    limit: i32,
) -> RateDecision {
    let reset = last_request_date != Some(today);
    let current = if reset { 0 } else { requests_today };

    if current >= limit {
        RateDecision::Reject { used: current }
    } else {
        RateDecision::Allow {
            used: current + 1,
            reset,
        }
    }
}

/// Start of the next UTC day, when counters reset.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn rate_limited(tier: ApiKeyTier, limit: i32, used: i32, now: DateTime<Utc>) -> AppError {
    AppError::RateLimited {
        tier,
        limit,
        used,
        reset_at: next_reset(now),
    }
}

/// Count one request against `key`, returning the updated count.
///
/// # Process
///
/// 1. Reset the counter if it was last touched on an earlier day
/// 2. Reject when the counter already reached `limit`
/// 3. Increment the counter
///
/// The increment is conditional on the stored counter still being below the
/// limit, so concurrent requests on the same key cannot push it past the
/// quota.
///
/// # Errors
///
/// - `RateLimited`: quota exhausted for today
/// - `Database`: database error occurred
pub async fn consume(
    pool: &DbPool,
    key: &ApiKey,
    limit: i32,
    now: DateTime<Utc>,
) -> Result<i32, AppError> {
    let today = now.date_naive();

    let reset = match evaluate(key.requests_today, key.last_request_date, today, limit) {
        RateDecision::Reject { used } => {
            tracing::warn!(
                api_key_id = %key.id,
                tier = %key.tier,
                limit,
                used,
                "rate limit exceeded"
            );
            return Err(rate_limited(key.tier, limit, used, now));
        }
        RateDecision::Allow { reset, .. } => reset,
    };

    if reset {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET requests_today = 0, last_request_date = $1
            WHERE id = $2 AND last_request_date IS DISTINCT FROM $1
            "#,
        )
        .bind(today)
        .bind(key.id)
        .execute(pool)
        .await?;
    }

    let used: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE api_keys
        SET requests_today = requests_today + 1, last_request_date = $1
        WHERE id = $2 AND requests_today < $3
        RETURNING requests_today
        "#,
    )
    .bind(today)
    .bind(key.id)
    .bind(limit)
    .fetch_optional(pool)
    .await?;

    // None: a concurrent request took the last slot between read and write
    used.ok_or_else(|| rate_limited(key.tier, limit, limit, now))
}

/// Append one entry to the usage log.
pub async fn record_usage(
    pool: &DbPool,
    api_key_id: uuid::Uuid,
    endpoint: &str,
    method: &str,
    status_code: u16,
    ip_address: Option<&str>,
    user_agent: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO api_usage_logs (api_key_id, endpoint, method, status_code, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(api_key_id)
    .bind(endpoint)
    .bind(method)
    .bind(i32::from(status_code))
    .bind(ip_address)
    .bind(user_agent)
    .execute(pool)
    .await?;

    Ok(())
}
