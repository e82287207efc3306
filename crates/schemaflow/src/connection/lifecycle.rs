//! Connection lifecycle: initialize the pool, then migrate, then be ready.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use schemaflow_engine::DataSource;

use crate::connection::pool::{validate, DriverPoolBuilder, PoolBuilder, PoolSettings};
use crate::error::{ConnectionError, ConnectionResult};
use crate::migrator::{Migrator, NoOpMigrator};

/// Lifecycle states of a migrated connection.
///
/// `Ready` is the only state in which the data source is usable. A failed
/// connection stays in `Failed` until `initialize` is called again, which
/// restarts the whole sequence from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconfigured,
    PoolInitializing,
    Migrating,
    Ready,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Unconfigured => "unconfigured",
            ConnectionState::PoolInitializing => "pool-initializing",
            ConnectionState::Migrating => "migrating",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The initialize-then-migrate sequence shared by every pool flavor.
///
/// Pool setup and migration failures surface through the same
/// [`ConnectionError::Initialization`] variant; the wrapped cause tells them
/// apart. Migration runs exactly once, only after the pool is up and
/// validated.
async fn initialize_with(
    state: &mut ConnectionState,
    builder: &dyn PoolBuilder,
    migrator: &dyn Migrator,
) -> ConnectionResult<DataSource> {
    *state = ConnectionState::PoolInitializing;
    let source = match builder.build().await {
        Ok(source) => source,
        Err(e) => {
            *state = ConnectionState::Failed;
            error!("pool setup failed: {}", e);
            return Err(ConnectionError::initialization(e));
        }
    };
    if let Err(e) = validate(&source).await {
        *state = ConnectionState::Failed;
        error!("pool validation failed: {}", e);
        return Err(ConnectionError::initialization(e));
    }

    *state = ConnectionState::Migrating;
    if let Err(e) = migrator.migrate(&source).await {
        *state = ConnectionState::Failed;
        error!("migration failed during connection initialization: {}", e);
        return Err(ConnectionError::initialization(e));
    }

    *state = ConnectionState::Ready;
    debug!("connection initialized and ready");
    Ok(source)
}

/// A pooled connection that runs its migrator as the tail of initialization.
///
/// Generic over the [`PoolBuilder`] capability so every pool-construction
/// flavor shares one lifecycle; see [`MigratedConnection`] and
/// [`PluggableConnection`] for the two shipped flavors.
pub struct Connection<B: PoolBuilder> {
    builder: B,
    migrator: Arc<dyn Migrator>,
    state: ConnectionState,
    source: Option<DataSource>,
}

impl<B: PoolBuilder> Connection<B> {
    pub fn with_builder(builder: B) -> Self {
        Self {
            builder,
            migrator: NoOpMigrator::shared(),
            state: ConnectionState::Unconfigured,
            source: None,
        }
    }

    /// Replace the migrator. Defaults to the shared no-op.
    pub fn with_migrator(mut self, migrator: Arc<dyn Migrator>) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn set_migrator(&mut self, migrator: Arc<dyn Migrator>) {
        self.migrator = migrator;
    }

    /// The migrator this connection will run; never absent.
    pub fn migrator(&self) -> &dyn Migrator {
        self.migrator.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bring the pool up, run the migrator, and become ready.
    ///
    /// Can be called again after a failure (or after `close`); every call
    /// re-runs both pool setup and migration from scratch.
    pub async fn initialize(&mut self) -> ConnectionResult<()> {
        self.source = None;
        let source =
            initialize_with(&mut self.state, &self.builder, self.migrator.as_ref()).await?;
        self.source = Some(source);
        Ok(())
    }

    /// The data source, available only once `Ready`.
    pub fn data_source(&self) -> ConnectionResult<&DataSource> {
        match (&self.source, self.state) {
            (Some(source), ConnectionState::Ready) => Ok(source),
            _ => Err(ConnectionError::NotReady { state: self.state }),
        }
    }

    /// Close the pool and return to `Unconfigured`.
    pub async fn close(&mut self) {
        if let Some(source) = self.source.take() {
            source.close().await;
        }
        self.state = ConnectionState::Unconfigured;
    }
}

/// Connection that builds its own pool from a connection URL and
/// [`PoolSettings`].
pub type MigratedConnection = Connection<DriverPoolBuilder>;

impl MigratedConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_settings(url, PoolSettings::default())
    }

    pub fn with_settings(url: impl Into<String>, settings: PoolSettings) -> Self {
        Self::with_builder(DriverPoolBuilder::new(url, settings))
    }

    pub fn url(&self) -> &str {
        self.builder.url()
    }
}

/// Connection whose pool comes from an externally supplied [`PoolBuilder`].
pub type PluggableConnection = Connection<Box<dyn PoolBuilder>>;

impl PluggableConnection {
    pub fn new(builder: impl PoolBuilder + 'static) -> Self {
        Self::with_builder(Box::new(builder))
    }
}
