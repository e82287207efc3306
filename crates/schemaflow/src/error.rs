//! Error types for migrators and migrated connections.

use crate::connection::ConnectionState;

/// Boxed error type accepted from arbitrary migration strategies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Failure of a [`Migrator`](crate::migrator::Migrator) run.
///
/// Wraps whatever the underlying strategy reports, so custom migrators are
/// not forced into the default engine's error type.
#[derive(Debug, thiserror::Error)]
#[error("migration failed: {source}")]
pub struct MigrateError {
    #[source]
    source: BoxError,
}

impl MigrateError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl From<schemaflow_engine::EngineError> for MigrateError {
    fn from(err: schemaflow_engine::EngineError) -> Self {
        Self::new(err)
    }
}

impl From<anyhow::Error> for MigrateError {
    fn from(err: anyhow::Error) -> Self {
        Self { source: err.into() }
    }
}

/// Connection pool setup error types.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("connection acquisition failed: {0}")]
    AcquisitionFailed(#[from] sqlx::Error),

    #[error("connection validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

/// Error types for migrated connections.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Initialization failed, either during pool setup or during migration.
    /// The two are told apart by inspecting the wrapped cause, not the type:
    /// a [`PoolError`] means the pool never came up, a [`MigrateError`] means
    /// the pool was usable but the migration step failed.
    #[error("connection initialization failed: {source}")]
    Initialization {
        #[source]
        source: BoxError,
    },

    /// The connection has not (successfully) been initialized.
    #[error("connection is not ready ({state})")]
    NotReady { state: ConnectionState },
}

impl ConnectionError {
    pub(crate) fn initialization(source: impl Into<BoxError>) -> Self {
        Self::Initialization {
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn initialization_failures_share_one_variant() {
        let from_pool = ConnectionError::initialization(PoolError::Configuration {
            message: "bad url".to_string(),
        });
        let from_migration = ConnectionError::initialization(MigrateError::new(
            schemaflow_engine::EngineError::Configuration("bad table".to_string()),
        ));

        // Same variant either way; only the cause differs.
        assert!(matches!(from_pool, ConnectionError::Initialization { .. }));
        assert!(matches!(
            from_migration,
            ConnectionError::Initialization { .. }
        ));
        assert!(from_pool.source().unwrap().downcast_ref::<PoolError>().is_some());
        assert!(from_migration
            .source()
            .unwrap()
            .downcast_ref::<MigrateError>()
            .is_some());
    }

    #[test]
    fn migrate_error_preserves_the_cause() {
        let err = MigrateError::from(schemaflow_engine::EngineError::Configuration(
            "unsupported database scheme `mysql`".to_string(),
        ));
        let cause = err.source().unwrap();
        assert!(cause
            .downcast_ref::<schemaflow_engine::EngineError>()
            .is_some());
    }
}
