use redis::aio::ConnectionManager;
use std::sync::Arc;
use crate::cache::local::LocalProfileCache;
use crate::config::Config;
use crate::crypto::token::CredentialIssuer;
use crate::error::Result;
use crate::repositories::{
    profile::{MemoryProfileStore, ProfileStore, RedisProfileStore},
    session::{MemorySessionLedger, PgSessionLedger, SessionLedger},
    user::{MemoryUserDirectory, PgUserDirectory, UserDirectory},
};
use crate::services::{auth::AuthService, profiles::ProfileService};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Accounts, credentials and sessions.
    pub auth: AuthService,
    /// CV storage and retrieval.
    pub profiles: ProfileService,
}

impl AppState {
    /// Connects to PostgreSQL and Redis and builds the production state.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::ensure_schema(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        Self::from_parts(
            config,
            Arc::new(PgUserDirectory::new(db.clone())),
            Arc::new(PgSessionLedger::new(db, config.max_sessions)),
            Arc::new(RedisProfileStore::new(redis)),
        )
    }

    /// Builds the state over in-process stores; nothing outlives the process.
    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::from_parts(
            config,
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemorySessionLedger::new(config.max_sessions)),
            Arc::new(MemoryProfileStore::new()),
        )
    }

    /// Wires the services over the given stores.
    pub fn from_parts(
        config: &Config,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn SessionLedger>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self> {
        let issuer = CredentialIssuer::new(&config.signing_key, config.token_ttl)?;
        tracing::info!("✅ Credential issuer ready (ttl {}s)", config.token_ttl.as_secs());

        let local = LocalProfileCache::new();

        Ok(AppState {
            config: Arc::new(config.clone()),
            auth: AuthService::new(users, ledger, issuer),
            profiles: ProfileService::new(
                profiles,
                local,
                config.cv_ttl,
                config.fetch_concurrency,
                config.fetch_timeout,
            ),
        })
    }
}
