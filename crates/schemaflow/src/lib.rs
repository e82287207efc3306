//! # schemaflow: schema migration for pooled database connections
//!
//! A [`MigratedConnection`] brings its pool up, runs the configured
//! [`Migrator`] against the fresh data source, and only then becomes usable.
//! With no migrator configured it behaves exactly like a plain pooled
//! connection; with a [`DefaultMigrator`] it applies versioned SQL scripts
//! through [`schemaflow_engine`] before the first caller sees the pool.
//!
//! ```no_run
//! use std::sync::Arc;
//! use schemaflow::{DefaultMigrator, MigratedConnection};
//!
//! # async fn run() -> schemaflow::ConnectionResult<()> {
//! let migrator = DefaultMigrator::new()
//!     .with_locations(["filesystem:./migrations"])
//!     .with_baseline(true);
//! let mut connection =
//!     MigratedConnection::new("postgres://app@db/app").with_migrator(Arc::new(migrator));
//! connection.initialize().await?;
//! let source = connection.data_source()?;
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod migrator;

pub use config::{ConnectionSettings, MigratorSettings};
pub use connection::{
    Connection, ConnectionState, DriverPoolBuilder, MigratedConnection, PluggableConnection,
    PoolBuilder, PoolSettings,
};
pub use error::{BoxError, ConnectionError, ConnectionResult, MigrateError, PoolError};
pub use migrator::{DefaultMigrator, Migrator, NoOpMigrator};

// The engine the default migrator drives, re-exported for callers that
// configure it directly.
pub use schemaflow_engine as engine;
pub use schemaflow_engine::{DataSource, Dialect, EmbeddedScripts, Location};
