//! `SQLite` connection pool and schema.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! so no database is needed at build time. The schema is a single table
//! and is created on connect.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL, e.g. `sqlite://tripwire.db` or `sqlite::memory:`.
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration from a database URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    ///
    /// In-memory databases are per-connection; use 1 for those.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Connection pool handle with the trigger-state schema in place.
#[derive(Debug, Clone)]
pub struct StatePool {
    pool: SqlitePool,
}

impl StatePool {
    /// Connect (creating the database file if needed) and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Sqlite`] if the connection or schema setup fails.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DbError::Config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await?;

        let this = Self { pool };
        this.init_schema().await?;

        tracing::info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Connected to SQLite"
        );
        Ok(this)
    }

    /// Connect using a database URL with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection fails.
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        Self::connect(&SqliteConfig::new(url)).await
    }

    /// Ensure the `trigger_state` table exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the statement fails.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS trigger_state (
                scope TEXT NOT NULL,
                rule_id TEXT NOT NULL,
                fire_count INTEGER NOT NULL DEFAULT 0,
                last_fired_at TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, rule_id)
            );
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }
}
