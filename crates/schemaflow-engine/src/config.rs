//! Fluent engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::history::DEFAULT_HISTORY_TABLE;
use crate::location::{EmbeddedScripts, Location};
use crate::runner::{Engine, DEFAULT_BASELINE_VERSION};
use crate::source::DataSource;

/// Configuration for an [`Engine`], bound to a data source with
/// [`EngineConfig::build`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    locations: Vec<Location>,
    history_table: Option<String>,
    baseline_version: Option<u32>,
    embedded: Option<EmbeddedScripts>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the locations to scan. Order is preserved.
    pub fn locations<I, L>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Append one location.
    pub fn location(mut self, location: impl Into<Location>) -> Self {
        self.locations.push(location.into());
        self
    }

    /// Use an alternative history table. An empty name keeps the default.
    pub fn history_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !table.is_empty() {
            self.history_table = Some(table);
        }
        self
    }

    /// Version a baseline marks the schema at. Defaults to 1; scripts at or
    /// below it are skipped once a baseline row exists.
    pub fn baseline_version(mut self, version: u32) -> Self {
        self.baseline_version = Some(version);
        self
    }

    /// Register bundled scripts so `embedded:` locations can be resolved.
    pub fn embedded(mut self, scripts: EmbeddedScripts) -> Self {
        self.embedded = Some(scripts);
        self
    }

    /// Bind the configuration to a data source.
    pub fn build(self, source: DataSource) -> EngineResult<Engine> {
        validate_table_name(self.history_table_name())?;
        Ok(Engine::new(self, source))
    }

    pub(crate) fn location_list(&self) -> &[Location] {
        &self.locations
    }

    pub(crate) fn history_table_name(&self) -> &str {
        self.history_table.as_deref().unwrap_or(DEFAULT_HISTORY_TABLE)
    }

    pub(crate) fn baseline_version_or_default(&self) -> u32 {
        self.baseline_version.unwrap_or(DEFAULT_BASELINE_VERSION)
    }

    pub(crate) fn embedded_scripts(&self) -> Option<&EmbeddedScripts> {
        self.embedded.as_ref()
    }
}

/// The history table name is spliced into SQL, so it must stay a plain
/// identifier.
fn validate_table_name(name: &str) -> EngineResult<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(EngineError::Configuration(format!(
            "invalid history table name `{}`",
            name
        )))
    }
}
