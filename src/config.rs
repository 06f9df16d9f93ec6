//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

use crate::models::api_key::ApiKeyTier;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `JWT_SECRET` (required): secret used to sign bearer tokens
/// - `PORT` (optional): HTTP server port, defaults to 5000
/// - `JWT_EXPIRES_IN` (optional): token lifetime such as `7d`, `12h` or `3600`, defaults to `7d`
/// - `RATE_LIMIT_FREE_TIER` (optional): daily quota for free keys, defaults to 100
/// - `RATE_LIMIT_PREMIUM_TIER` (optional): daily quota for premium keys, defaults to 1000
/// - `CORS_ORIGIN` (optional): browser origin allowed to call the API
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_jwt_expires_in")]
    pub jwt_expires_in: String,

    #[serde(default = "default_free_tier")]
    pub rate_limit_free_tier: i32,

    #[serde(default = "default_premium_tier")]
    pub rate_limit_premium_tier: i32,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_port() -> u16 {
    5000
}

fn default_jwt_expires_in() -> String {
    "7d".to_string()
}

fn default_free_tier() -> i32 {
    100
}

fn default_premium_tier() -> i32 {
    1000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Lifetime of issued bearer tokens, parsed from `JWT_EXPIRES_IN`.
    pub fn token_lifetime(&self) -> anyhow::Result<Duration> {
        parse_lifetime(&self.jwt_expires_in).ok_or_else(|| {
            anyhow::anyhow!("invalid JWT_EXPIRES_IN value: {:?}", self.jwt_expires_in)
        })
    }

    /// Daily request quota for the given API key tier.
    pub fn daily_limit(&self, tier: ApiKeyTier) -> i32 {
        match tier {
            ApiKeyTier::Free => self.rate_limit_free_tier,
            ApiKeyTier::Premium => self.rate_limit_premium_tier,
        }
    }
}

/// Longest accepted token lifetime (100 years).
const MAX_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Parse `"<n>[s|m|h|d]"` into a duration. A bare number is seconds.
fn parse_lifetime(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&value[..idx], c),
        _ => (value, 's'),
    };

    let amount: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };

    match amount.checked_mul(multiplier)? {
        0 => None,
        secs if secs > MAX_LIFETIME_SECS => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        envy::from_iter(vars).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/beanbyte"),
            ("JWT_SECRET", "secret"),
        ]);

        assert_eq!(config.port, 5000);
        assert_eq!(config.rate_limit_free_tier, 100);
        assert_eq!(config.rate_limit_premium_tier, 1000);
        assert_eq!(config.cors_origin, "http://localhost:5173");
        assert_eq!(
            config.token_lifetime().unwrap(),
            Duration::from_secs(7 * 24 * 3600)
        );
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let vars = vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/beanbyte".to_string(),
        )];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn test_tier_limits_from_env() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/beanbyte"),
            ("JWT_SECRET", "secret"),
            ("RATE_LIMIT_FREE_TIER", "3"),
            ("RATE_LIMIT_PREMIUM_TIER", "30"),
        ]);

        assert_eq!(config.daily_limit(ApiKeyTier::Free), 3);
        assert_eq!(config.daily_limit(ApiKeyTier::Premium), 30);
    }

    #[test]
    fn test_parse_lifetime() {
        assert_eq!(parse_lifetime("3600"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_lifetime("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_lifetime("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_lifetime("12h"), Some(Duration::from_secs(43200)));
        assert_eq!(parse_lifetime("7d"), Some(Duration::from_secs(604800)));
        assert_eq!(parse_lifetime("0"), None);
        assert_eq!(parse_lifetime("7w"), None);
        assert_eq!(parse_lifetime("abc"), None);
        assert_eq!(parse_lifetime(""), None);
    }

    #[test]
    fn test_parse_lifetime_rejects_huge_values() {
        assert_eq!(parse_lifetime("18446744073709551615"), None);
        assert_eq!(parse_lifetime("36500d"), None);
        assert_eq!(
            parse_lifetime("3650d"),
            Some(Duration::from_secs(3650 * 86400))
        );
    }
}
