//! Shared application state handed to every handler and middleware.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, db::DbPool, services::token_service::TokenService};

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&config.jwt_secret, config.token_lifetime()?);

        Ok(Self {
            pool,
            config: Arc::new(config),
            tokens,
        })
    }
}

/// Lets handlers that only need the database extract `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
