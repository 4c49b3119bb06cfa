use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// Minimum length of the HMAC signing key in bytes.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The key used to sign session credentials.
    pub signing_key: Zeroizing<Vec<u8>>,
    /// Lifetime of an issued session credential.
    pub token_ttl: Duration,
    /// Lifetime of a stored CV document.
    pub cv_ttl: Duration,
    /// Maximum number of live sessions per user.
    pub max_sessions: usize,
    /// Maximum number of concurrent lookups in one profile fan-out.
    pub fetch_concurrency: usize,
    /// Upper bound on how long a listing request waits for its fan-out.
    pub fetch_timeout: Duration,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut signing_key_hex = env::var("SIGNING_KEY")
            .context("SIGNING_KEY must be set (generate with: openssl rand -hex 32)")?;

        let signing_key_bytes = hex::decode(&signing_key_hex)
            .context("SIGNING_KEY must be valid hexadecimal")?;

        signing_key_hex.zeroize();

        if signing_key_bytes.len() < MIN_SIGNING_KEY_BYTES {
            anyhow::bail!("SIGNING_KEY must be at least 32 bytes (64 hex characters)");
        }

        let max_sessions: usize = parse_or("MAX_SESSIONS", 5)?;
        if max_sessions == 0 {
            anyhow::bail!("MAX_SESSIONS must be at least 1");
        }

        let fetch_concurrency: usize = parse_or("FETCH_CONCURRENCY", 64)?;
        if fetch_concurrency == 0 {
            anyhow::bail!("FETCH_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            signing_key: Zeroizing::new(signing_key_bytes),
            token_ttl: Duration::from_secs(parse_or::<u64>("TOKEN_TTL_MINUTES", 15)? * 60),
            cv_ttl: Duration::from_secs(parse_or::<u64>("CV_TTL_HOURS", 24 * 7)? * 3600),
            max_sessions,
            fetch_concurrency,
            fetch_timeout: Duration::from_secs(parse_or("FETCH_TIMEOUT_SECS", 5)?),
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string()) == "production",
        })
    }

    /// A configuration for in-process use (tests, local tooling) that never
    /// touches the environment.
    pub fn for_local(signing_key: &[u8]) -> Self {
        Self {
            database_url: String::new(),
            redis_url: String::new(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            signing_key: Zeroizing::new(signing_key.to_vec()),
            token_ttl: Duration::from_secs(15 * 60),
            cv_ttl: Duration::from_secs(7 * 24 * 3600),
            max_sessions: 5,
            fetch_concurrency: 64,
            fetch_timeout: Duration::from_secs(5),
            secure_cookies: false,
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}
