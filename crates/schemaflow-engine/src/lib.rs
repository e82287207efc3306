//! # schemaflow-engine: Versioned SQL Migration Engine
//!
//! Discovers versioned migration scripts from configured locations, applies
//! the ones a schema has not seen yet, and records every applied version in a
//! schema-history table. An existing, unmanaged schema can be baselined at a
//! starting version so only later scripts are applied.
//!
//! The engine is configured fluently and bound to a [`DataSource`]:
//!
//! ```no_run
//! use schemaflow_engine::{DataSource, Engine};
//!
//! # async fn run() -> schemaflow_engine::EngineResult<()> {
//! let source = DataSource::connect("sqlite://app.db?mode=rwc").await?;
//! let engine = Engine::configure()
//!     .location("filesystem:./migrations")
//!     .build(source)?;
//! let report = engine.migrate().await?;
//! println!("applied {} migration(s)", report.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod location;
pub mod runner;
pub mod script;
pub mod source;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use history::{HistoryRecord, RecordKind, SchemaHistory, DEFAULT_HISTORY_TABLE};
pub use location::{EmbeddedScripts, Location};
pub use runner::{Engine, MigrateReport, DEFAULT_BASELINE_VERSION};
pub use script::MigrationScript;
pub use source::{ensure_drivers, DataSource, Dialect};
