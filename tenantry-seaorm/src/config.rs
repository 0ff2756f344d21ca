//! Connection configuration for tenant sessions.

use crate::SeaOrmError;
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenantry_core::TenancyConfig;

/// Configuration for a SeaORM connection driven by a tenant context.
///
/// The pool always holds exactly one session and never recycles it.
/// `SET search_path` is session state, so a second or replacement session
/// would come up on the starting search path while the tenant context still
/// records the tenant's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL.
    pub database_url: String,

    /// Connection timeout.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Enable SQLx statement logging.
    #[serde(default)]
    pub sqlx_logging: bool,

    /// Search path the session starts on.
    #[serde(default)]
    pub schema: Option<String>,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl DatabaseConfig {
    /// Create a new configuration with the given database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            connect_timeout: default_connect_timeout(),
            sqlx_logging: false,
            schema: None,
        }
    }

    /// Build from a [`TenancyConfig`], starting on its default schema.
    pub fn from_tenancy(config: &TenancyConfig) -> Result<Self, SeaOrmError> {
        let url = config
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| SeaOrmError::Config("database_url not configured".into()))?;
        Ok(Self::new(url).schema(config.default_schema.clone()))
    }

    /// Create configuration from environment variables.
    ///
    /// Uses the following environment variables:
    /// - `DATABASE_URL`: Required database URL
    /// - `DATABASE_CONNECT_TIMEOUT`: Connect timeout in seconds
    /// - `DATABASE_SQLX_LOGGING`: Enable SQLx logging (true/false)
    pub fn from_env() -> Result<Self, SeaOrmError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| SeaOrmError::Config("DATABASE_URL not set".into()))?;

        let mut config = Self::new(database_url);

        if let Ok(timeout) = std::env::var("DATABASE_CONNECT_TIMEOUT") {
            config.connect_timeout = Duration::from_secs(timeout.parse().map_err(|_| {
                SeaOrmError::Config("Invalid DATABASE_CONNECT_TIMEOUT".into())
            })?);
        }

        if let Ok(logging) = std::env::var("DATABASE_SQLX_LOGGING") {
            config.sqlx_logging = logging == "true" || logging == "1";
        }

        Ok(config)
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable SQLx logging.
    pub fn sqlx_logging(mut self, enabled: bool) -> Self {
        self.sqlx_logging = enabled;
        self
    }

    /// Set the starting search path.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Pool options pinning a single session for the pool's lifetime.
    ///
    /// Idle reaping and lifetime expiry are both disabled; sqlx would
    /// otherwise replace the session after 10 and 30 minutes.
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
    }

    /// Session options parsed from the URL, starting on the configured schema.
    pub fn pg_connect_options(&self) -> Result<PgConnectOptions, SeaOrmError> {
        let mut options: PgConnectOptions = self
            .database_url
            .parse()
            .map_err(|e| SeaOrmError::Config(format!("Invalid database URL: {}", e)))?;

        if let Some(ref schema) = self.schema {
            options = options.options([("search_path", schema.as_str())]);
        }
        if !self.sqlx_logging {
            options = options.disable_statement_logging();
        }

        Ok(options)
    }

    /// The URL with credentials removed, for logging.
    pub fn redacted_url(&self) -> String {
        match (self.database_url.find("://"), self.database_url.rfind('@')) {
            (Some(scheme), Some(at)) if at > scheme => {
                format!("{}***{}", &self.database_url[..scheme + 3], &self.database_url[at..])
            }
            _ => self.database_url.clone(),
        }
    }
}

/// Duration fields as whole seconds.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
