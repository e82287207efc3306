//! Migration policy invoked while a pooled connection initializes.
//!
//! The [`Migrator`] trait is the single seam between connection lifecycle and
//! migration behavior: a connection holds exactly one migrator and calls it
//! once per initialization attempt, after its pool is up. The default is
//! [`NoOpMigrator`], so a connection with nothing configured behaves exactly
//! like a plain pooled connection.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use schemaflow_engine::{DataSource, EmbeddedScripts, Engine, Location};

use crate::error::MigrateError;

/// A migration strategy run against a freshly initialized data source.
///
/// Each call is self-contained: given the same schema state it must be safe
/// to invoke again on a later initialization attempt.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn migrate(&self, source: &DataSource) -> Result<(), MigrateError>;
}

/// Migrator that performs no work and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMigrator;

static NO_OP: Lazy<Arc<NoOpMigrator>> = Lazy::new(|| Arc::new(NoOpMigrator));

impl NoOpMigrator {
    /// Shared instance substituted wherever no migrator is configured.
    pub fn shared() -> Arc<dyn Migrator> {
        NO_OP.clone()
    }
}

#[async_trait]
impl Migrator for NoOpMigrator {
    async fn migrate(&self, _source: &DataSource) -> Result<(), MigrateError> {
        debug!("no migrator configured; skipping migration");
        Ok(())
    }
}

/// The default migration policy: delegate to the engine with a set of script
/// locations, an optional history-table override and an optional baseline.
#[derive(Debug, Clone, Default)]
pub struct DefaultMigrator {
    locations: Vec<Location>,
    history_table: Option<String>,
    baseline: Option<bool>,
    embedded: Option<EmbeddedScripts>,
}

impl DefaultMigrator {
    /// A migrator with no locations; migrating with it is a successful no-op
    /// run (nothing to discover, nothing to apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations to scan recursively for migration scripts, in order.
    pub fn with_locations<I, L>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Alternative history table; when absent or empty the engine default is
    /// used.
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = Some(table.into());
        self
    }

    /// Whether to baseline a non-empty schema with no history before
    /// migrating. Defaults to false when never set.
    pub fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Bundled scripts backing `embedded:` locations.
    pub fn with_embedded(mut self, scripts: EmbeddedScripts) -> Self {
        self.embedded = Some(scripts);
        self
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn history_table(&self) -> Option<&str> {
        self.history_table.as_deref()
    }

    pub fn baseline(&self) -> Option<bool> {
        self.baseline
    }

    pub fn set_locations<I, L>(&mut self, locations: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
    }

    pub fn set_history_table(&mut self, table: impl Into<String>) {
        self.history_table = Some(table.into());
    }

    pub fn set_baseline(&mut self, baseline: bool) {
        self.baseline = Some(baseline);
    }

    fn baseline_enabled(&self) -> bool {
        self.baseline.unwrap_or(false)
    }
}

#[async_trait]
impl Migrator for DefaultMigrator {
    async fn migrate(&self, source: &DataSource) -> Result<(), MigrateError> {
        let mut config = Engine::configure().locations(self.locations.iter().cloned());
        if let Some(table) = self.history_table.as_deref() {
            if !table.is_empty() {
                config = config.history_table(table);
            }
        }
        if let Some(embedded) = &self.embedded {
            config = config.embedded(embedded.clone());
        }
        let engine = config.build(source.clone())?;
        if self.baseline_enabled() {
            engine.baseline().await?;
        }
        let report = engine.migrate().await?;
        info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            "schema migration complete"
        );
        Ok(())
    }
}
