//! Pool construction and validation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::any::AnyPoolOptions;
use tracing::debug;

use schemaflow_engine::{ensure_drivers, DataSource};

use crate::error::PoolError;

/// Connection pool configuration. Timeouts are in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),
            max_lifetime: Some(1800),
            test_before_acquire: true,
        }
    }
}

/// Capability that produces a ready pool wrapped in a [`DataSource`].
///
/// This is the only seam between the pool-construction flavors: a connection
/// runs the same initialize-then-migrate sequence no matter where its pool
/// comes from.
#[async_trait]
pub trait PoolBuilder: Send + Sync {
    async fn build(&self) -> Result<DataSource, PoolError>;
}

#[async_trait]
impl PoolBuilder for Box<dyn PoolBuilder> {
    async fn build(&self) -> Result<DataSource, PoolError> {
        (**self).build().await
    }
}

/// Builds a pool from a connection URL and [`PoolSettings`].
#[derive(Debug, Clone)]
pub struct DriverPoolBuilder {
    url: String,
    settings: PoolSettings,
}

impl DriverPoolBuilder {
    pub fn new(url: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            url: url.into(),
            settings,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

#[async_trait]
impl PoolBuilder for DriverPoolBuilder {
    async fn build(&self) -> Result<DataSource, PoolError> {
        ensure_drivers();
        let mut options = AnyPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .min_connections(self.settings.min_connections)
            .acquire_timeout(Duration::from_secs(self.settings.acquire_timeout))
            .test_before_acquire(self.settings.test_before_acquire);
        if let Some(secs) = self.settings.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.settings.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(secs));
        }
        let pool = options.connect(&self.url).await?;
        debug!(size = pool.size(), "connection pool established");
        DataSource::new(pool, self.url.as_str()).map_err(|e| PoolError::Configuration {
            message: e.to_string(),
        })
    }
}

/// Validate a freshly built pool with a trivial query.
pub(crate) async fn validate(source: &DataSource) -> Result<(), PoolError> {
    sqlx::query("SELECT 1")
        .execute(source.pool())
        .await
        .map_err(|e| PoolError::ValidationFailed {
            reason: e.to_string(),
        })?;
    Ok(())
}
