//! Engine execution: baseline and migrate runs.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::history::{HistoryRecord, RecordKind, SchemaHistory};
use crate::script::{discover, MigrationScript};
use crate::source::DataSource;

/// Version a baseline marks the schema at unless configured otherwise.
pub const DEFAULT_BASELINE_VERSION: u32 = 1;

/// Result of a migrate run.
#[derive(Debug, Clone)]
pub struct MigrateReport {
    /// Versions applied by this run, in apply order.
    pub applied: Vec<u32>,
    /// Discovered scripts that were already applied or below the baseline.
    pub skipped: usize,
    pub duration: Duration,
}

/// A configured migration engine bound to one data source.
///
/// `migrate` applies every pending script; `baseline` marks a pre-existing
/// schema with a starting version so only later scripts are applied.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    history: SchemaHistory,
    source: DataSource,
}

impl Engine {
    /// Start a fluent configuration.
    pub fn configure() -> EngineConfig {
        EngineConfig::new()
    }

    pub(crate) fn new(config: EngineConfig, source: DataSource) -> Self {
        let history = SchemaHistory::new(config.history_table_name());
        Self {
            config,
            history,
            source,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn history_table(&self) -> &str {
        self.history.table()
    }

    /// Mark the schema as starting at the configured baseline version.
    ///
    /// A no-op when the history table already exists, so calling it against
    /// an already-managed schema is always safe.
    pub async fn baseline(&self) -> EngineResult<()> {
        if self.history.exists(&self.source).await? {
            debug!(
                table = self.history.table(),
                "history table already present; baseline skipped"
            );
            return Ok(());
        }
        let version = self.config.baseline_version_or_default();
        self.history.create(&self.source).await?;
        let record = HistoryRecord {
            version,
            description: "baseline".to_string(),
            kind: RecordKind::Baseline,
            checksum: String::new(),
            applied_at: chrono::Utc::now().to_rfc3339(),
        };
        self.history.append(self.source.pool(), &record).await?;
        info!(version, table = self.history.table(), "schema baselined");
        Ok(())
    }

    /// Apply every pending script, in version order.
    ///
    /// With no history table yet: an empty script set succeeds as a no-op, a
    /// non-empty schema is refused until baselined, and an empty schema gets
    /// a fresh history table. Each script runs in its own transaction; the
    /// first failure aborts the run and leaves earlier scripts committed.
    pub async fn migrate(&self) -> EngineResult<MigrateReport> {
        let start = Instant::now();
        let scripts = discover(self.config.location_list(), self.config.embedded_scripts())?;

        let pending: Vec<&MigrationScript>;
        let skipped: usize;
        if self.history.exists(&self.source).await? {
            let records = self.history.records(&self.source).await?;
            validate_checksums(&scripts, &records)?;
            let baseline = records
                .iter()
                .filter(|record| record.kind == RecordKind::Baseline)
                .map(|record| record.version)
                .max();
            let applied: HashSet<u32> = records.iter().map(|record| record.version).collect();
            pending = scripts
                .iter()
                .filter(|script| {
                    !applied.contains(&script.version)
                        && baseline.map_or(true, |version| script.version > version)
                })
                .collect();
            skipped = scripts.len() - pending.len();
        } else {
            if scripts.is_empty() {
                debug!("no scripts discovered and no history table; nothing to do");
                return Ok(MigrateReport {
                    applied: Vec::new(),
                    skipped: 0,
                    duration: start.elapsed(),
                });
            }
            let tables = self.user_table_count().await?;
            if tables > 0 {
                return Err(EngineError::UnmanagedSchema { tables });
            }
            self.history.create(&self.source).await?;
            pending = scripts.iter().collect();
            skipped = 0;
        }

        let mut applied = Vec::with_capacity(pending.len());
        for script in pending {
            self.apply(script).await?;
            applied.push(script.version);
        }
        let report = MigrateReport {
            applied,
            skipped,
            duration: start.elapsed(),
        };
        info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            table = self.history.table(),
            "migration run complete"
        );
        Ok(report)
    }

    /// Apply one script and its history row in a single transaction.
    async fn apply(&self, script: &MigrationScript) -> EngineResult<()> {
        info!(
            version = script.version,
            description = %script.description,
            "applying migration"
        );
        let mut tx = self.source.pool().begin().await?;
        for statement in split_sql_statements(&script.sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| EngineError::Failed {
                    version: script.version,
                    source: e,
                })?;
        }
        let record = HistoryRecord {
            version: script.version,
            description: script.description.clone(),
            kind: RecordKind::Migration,
            checksum: script.checksum.clone(),
            applied_at: chrono::Utc::now().to_rfc3339(),
        };
        self.history.append(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn user_table_count(&self) -> EngineResult<i64> {
        let row = sqlx::query(self.source.dialect().user_table_count_sql())
            .bind(self.history.table())
            .fetch_one(self.source.pool())
            .await?;
        Ok(row.try_get(0)?)
    }
}

/// An applied script whose bytes changed since it was recorded is refused.
fn validate_checksums(
    scripts: &[MigrationScript],
    records: &[HistoryRecord],
) -> EngineResult<()> {
    for record in records {
        if record.kind != RecordKind::Migration {
            continue;
        }
        if let Some(script) = scripts.iter().find(|s| s.version == record.version) {
            if script.checksum != record.checksum {
                return Err(EngineError::ChecksumMismatch {
                    version: record.version,
                    expected: record.checksum.clone(),
                    actual: script.checksum.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Split a script into executable statements using proper SQL parsing,
/// falling back to naive semicolon splitting when the parser rejects it.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed
            .into_iter()
            .map(|statement| format!("{};", statement))
            .collect(),
        Err(e) => {
            warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|statement| !statement.is_empty())
                .map(|statement| format!("{};", statement))
                .collect()
        }
    }
}
