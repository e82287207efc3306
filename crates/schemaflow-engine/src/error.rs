//! Error types for the migration engine.

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for migration engine operations.
///
/// Every failure of a migrate or baseline run surfaces through this enum
/// unchanged; the engine never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine was configured with values it cannot work with.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A configured location could not be scanned.
    #[error("location `{location}` is not usable: {reason}")]
    Location { location: String, reason: String },

    /// A discovered script could not be read or has a malformed name.
    #[error("migration script `{script}` is not usable: {reason}")]
    Script { script: String, reason: String },

    /// Two scripts carry the same version.
    #[error("version {version} is provided by both `{first}` and `{second}`")]
    DuplicateVersion {
        version: u32,
        first: String,
        second: String,
    },

    /// An already-applied script no longer matches its recorded checksum.
    #[error("checksum mismatch for applied version {version}: history has {expected}, script has {actual}")]
    ChecksumMismatch {
        version: u32,
        expected: String,
        actual: String,
    },

    /// The schema contains tables but no history table, and no baseline was
    /// requested.
    #[error("found {tables} table(s) in a schema without a history table; baseline the schema before migrating")]
    UnmanagedSchema { tables: i64 },

    /// Any database error outside the execution of a migration script.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration script failed to execute. The transaction for that script
    /// is rolled back; previously applied scripts stay committed.
    #[error("migration to version {version} failed: {source}")]
    Failed {
        version: u32,
        #[source]
        source: sqlx::Error,
    },
}
