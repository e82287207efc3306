//! Configuration surface for migrated connections.
//!
//! Besides the current `migration` block this module still understands the
//! earlier layout that put `locations` and `baseline` directly on the
//! connection; those fields are adapted into a [`DefaultMigrator`] at lookup
//! time so the connection lifecycle only ever sees the [`Migrator`] contract.

use std::sync::{Arc, Once};

use serde::Deserialize;
use tracing::warn;

use crate::connection::{MigratedConnection, PoolSettings};
use crate::migrator::{DefaultMigrator, Migrator, NoOpMigrator};

/// Migration options recognized in configuration files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigratorSettings {
    /// Location strings, scanned in order (`filesystem:` or `embedded:`
    /// prefixed; bare strings are filesystem paths).
    #[serde(default)]
    pub locations: Vec<String>,
    /// Alternative history table; the engine default when absent.
    #[serde(default)]
    pub history_table: Option<String>,
    /// Baseline a non-empty, unmanaged schema before migrating.
    #[serde(default)]
    pub baseline: Option<bool>,
}

impl MigratorSettings {
    pub fn build(&self) -> DefaultMigrator {
        let mut migrator =
            DefaultMigrator::new().with_locations(self.locations.iter().map(String::as_str));
        if let Some(table) = &self.history_table {
            migrator = migrator.with_history_table(table.clone());
        }
        if let Some(baseline) = self.baseline {
            migrator = migrator.with_baseline(baseline);
        }
        migrator
    }
}

static LEGACY_FIELDS_WARNING: Once = Once::new();

/// Settings for a [`MigratedConnection`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    pub url: String,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub migration: Option<MigratorSettings>,

    // Deprecated inline fields, kept so old configuration files still load.
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    baseline: Option<bool>,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: PoolSettings::default(),
            migration: None,
            locations: Vec::new(),
            baseline: None,
        }
    }

    /// Resolve the migrator this connection should run.
    ///
    /// A `migration` block wins over the deprecated inline fields; with
    /// neither present the shared no-op is returned, so the caller never
    /// deals with an absent migrator.
    pub fn migrator(&self) -> Arc<dyn Migrator> {
        if let Some(settings) = &self.migration {
            return Arc::new(settings.build());
        }
        if !self.locations.is_empty() || self.baseline.is_some() {
            LEGACY_FIELDS_WARNING.call_once(|| {
                warn!(
                    "inline `locations`/`baseline` connection settings are deprecated; \
                     move them under `migration`"
                );
            });
            let legacy = MigratorSettings {
                locations: self.locations.clone(),
                history_table: None,
                baseline: self.baseline,
            };
            return Arc::new(legacy.build());
        }
        NoOpMigrator::shared()
    }

    /// Build the connection with the resolved migrator. It still needs
    /// [`MigratedConnection::initialize`] before use.
    pub fn connection(&self) -> MigratedConnection {
        MigratedConnection::with_settings(self.url.clone(), self.pool.clone())
            .with_migrator(self.migrator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaflow_engine::Location;

    #[test]
    fn migration_block_deserializes() {
        let settings: ConnectionSettings = serde_json::from_value(serde_json::json!({
            "url": "sqlite://app.db?mode=rwc",
            "migration": {
                "locations": ["filesystem:./sql", "embedded:migration/core"],
                "history_table": "audit_history",
                "baseline": true
            }
        }))
        .unwrap();

        let migration = settings.migration.as_ref().unwrap();
        assert_eq!(migration.locations.len(), 2);
        assert_eq!(migration.history_table.as_deref(), Some("audit_history"));
        assert_eq!(migration.baseline, Some(true));

        let migrator = migration.build();
        assert_eq!(migrator.locations()[0], Location::filesystem("./sql"));
        assert_eq!(migrator.baseline(), Some(true));
    }

    #[test]
    fn pool_settings_default_when_absent() {
        let settings: ConnectionSettings =
            serde_json::from_value(serde_json::json!({ "url": "sqlite::memory:" }))
                .unwrap();
        assert_eq!(settings.pool.max_connections, 10);
        assert!(settings.migration.is_none());
    }

    #[test]
    fn legacy_inline_fields_synthesize_a_default_migrator() {
        let settings: ConnectionSettings = serde_json::from_value(serde_json::json!({
            "url": "sqlite::memory:",
            "locations": ["filesystem:./sql"],
            "baseline": true
        }))
        .unwrap();

        assert!(settings.migration.is_none());
        // The resolved migrator carries the legacy values; behavior is
        // exercised end-to-end in the connection tests.
        let _migrator = settings.migrator();
        assert_eq!(settings.locations, vec!["filesystem:./sql".to_string()]);
        assert_eq!(settings.baseline, Some(true));
    }

    #[test]
    fn migration_block_wins_over_legacy_fields() {
        let settings: ConnectionSettings = serde_json::from_value(serde_json::json!({
            "url": "sqlite::memory:",
            "locations": ["filesystem:./old"],
            "migration": { "locations": ["filesystem:./new"] }
        }))
        .unwrap();
        assert_eq!(
            settings.migration.unwrap().locations,
            vec!["filesystem:./new".to_string()]
        );
    }
}
