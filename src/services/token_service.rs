//! Signed bearer tokens (HS256 JWT).
//!
//! A token carries the user's id, email and role, so the token middleware can
//! authenticate a request without a database round trip. Role changes take
//! effect when the user next logs in.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Role, User};

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued at, seconds since the epoch
    pub iat: u64,
    /// Expiry, seconds since the epoch
    pub exp: u64,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    /// Create a token for `user`, valid for the configured lifetime.
    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let exp = now
            .checked_add(self.lifetime.as_secs())
            .ok_or_else(|| anyhow::anyhow!("token lifetime overflows the expiry timestamp"))?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp,
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!(error = %e, "token verification failed");
                    TokenError::Invalid
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Dewi".to_string(),
            email: "dewi@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    fn service(secret: &str) -> TokenService {
        TokenService::new(secret, Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service("test-secret");
        let user = user(Role::Admin);

        let token = tokens.issue(&user).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "dewi@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = service("secret-a").issue(&user(Role::User)).unwrap();
        assert_eq!(
            service("secret-b").verify(&token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(
            service("s").verify("not.a.jwt").unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_overflowing_lifetime_is_an_error() {
        let tokens = TokenService::new("test-secret", Duration::from_secs(u64::MAX));
        assert!(tokens.issue(&user(Role::User)).is_err());
    }

    #[test]
    fn test_expired_token() {
        let tokens = service("test-secret");
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "old@example.com".to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
        };

        let token = tokens.sign(&claims).unwrap();
        assert_eq!(tokens.verify(&token).unwrap_err(), TokenError::Expired);
    }
}
