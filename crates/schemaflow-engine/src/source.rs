//! Data source handle and dialect detection.
//!
//! A [`DataSource`] wraps an [`sqlx::AnyPool`] together with the URL it was
//! built from, so the engine can pick the right catalog queries for the
//! backend behind the pool.

use std::sync::Once;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use url::Url;

use crate::error::{EngineError, EngineResult};

static DRIVERS: Once = Once::new();

/// Install the sqlx `Any` drivers for the enabled backends.
///
/// Safe to call from multiple threads; only the first call has any effect.
/// Every code path that builds an `AnyPool` must go through this.
pub fn ensure_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Database backends the engine can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> EngineResult<Self> {
        let parsed = Url::parse(url).map_err(|e| {
            EngineError::Configuration(format!("invalid database url `{}`: {}", url, e))
        })?;
        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(EngineError::Configuration(format!(
                "unsupported database scheme `{}`",
                other
            ))),
        }
    }

    /// Query returning one row when the table bound as `$1` exists.
    pub(crate) fn table_exists_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Dialect::Sqlite => "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = $1",
        }
    }

    /// Query counting user tables other than the history table bound as `$1`.
    pub(crate) fn user_table_count_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
                 AND table_name <> $1"
            }
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name <> $1"
            }
        }
    }
}

/// Handle to a pooled database the engine migrates.
#[derive(Debug, Clone)]
pub struct DataSource {
    pool: AnyPool,
    url: String,
    dialect: Dialect,
}

impl DataSource {
    /// Wrap an existing pool. The URL is only used to pick the dialect and
    /// for diagnostics; it must match the pool's backend.
    pub fn new(pool: AnyPool, url: impl Into<String>) -> EngineResult<Self> {
        let url = url.into();
        let dialect = Dialect::from_url(&url)?;
        Ok(Self { pool, url, dialect })
    }

    /// Connect eagerly with default pool options.
    pub async fn connect(url: &str) -> EngineResult<Self> {
        ensure_drivers();
        let pool = AnyPoolOptions::new().connect(url).await?;
        Self::new(pool, url)
    }

    /// Build a pool without connecting; the first query opens a connection.
    pub fn connect_lazy(url: &str) -> EngineResult<Self> {
        ensure_drivers();
        let pool = AnyPoolOptions::new().connect_lazy(url)?;
        Self::new(pool, url)
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
