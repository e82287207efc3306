//! Schema-history table access.
//!
//! The history table records which versions have been applied to a schema,
//! including the synthetic baseline row. All SQL here is portable across the
//! supported dialects.

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::EngineResult;
use crate::source::DataSource;

/// History table name used when no override is configured.
pub const DEFAULT_HISTORY_TABLE: &str = "schema_history";

/// What a history row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// An applied migration script.
    Migration,
    /// The synthetic starting-version row written by a baseline.
    Baseline,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Migration => "migration",
            RecordKind::Baseline => "baseline",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "baseline" => RecordKind::Baseline,
            _ => RecordKind::Migration,
        }
    }
}

/// One row of the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub version: u32,
    pub description: String,
    pub kind: RecordKind,
    /// Hex SHA-256 of the applied script; empty for baseline rows.
    pub checksum: String,
    /// RFC 3339 timestamp of when the row was written.
    pub applied_at: String,
}

/// Access to one named history table on a data source.
#[derive(Debug, Clone)]
pub struct SchemaHistory {
    table: String,
}

impl SchemaHistory {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the history table exists on the data source.
    pub async fn exists(&self, source: &DataSource) -> EngineResult<bool> {
        let row = sqlx::query(source.dialect().table_exists_sql())
            .bind(self.table.as_str())
            .fetch_optional(source.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Create the history table if it is missing.
    pub async fn create(&self, source: &DataSource) -> EngineResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version BIGINT PRIMARY KEY,\n    \
                description VARCHAR(255) NOT NULL,\n    \
                kind VARCHAR(20) NOT NULL,\n    \
                checksum VARCHAR(64) NOT NULL,\n    \
                applied_at VARCHAR(64) NOT NULL\n\
            )",
            self.table
        );
        sqlx::query(&sql).execute(source.pool()).await?;
        Ok(())
    }

    /// All history rows, oldest version first.
    pub async fn records(&self, source: &DataSource) -> EngineResult<Vec<HistoryRecord>> {
        let sql = format!(
            "SELECT version, description, kind, checksum, applied_at FROM {} ORDER BY version",
            self.table
        );
        let rows = sqlx::query(&sql).fetch_all(source.pool()).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get("kind")?;
            records.push(HistoryRecord {
                version: row.try_get::<i64, _>("version")? as u32,
                description: row.try_get("description")?,
                kind: RecordKind::parse(&kind),
                checksum: row.try_get("checksum")?,
                applied_at: row.try_get("applied_at")?,
            });
        }
        Ok(records)
    }

    /// Append one row through any executor (pool, connection, transaction).
    pub async fn append<'e, E>(&self, executor: E, record: &HistoryRecord) -> EngineResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Any>,
    {
        let sql = format!(
            "INSERT INTO {} (version, description, kind, checksum, applied_at) \
             VALUES ($1, $2, $3, $4, $5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(record.version as i64)
            .bind(record.description.as_str())
            .bind(record.kind.as_str())
            .bind(record.checksum.as_str())
            .bind(record.applied_at.as_str())
            .execute(executor)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_round_trips() {
        for kind in [RecordKind::Migration, RecordKind::Baseline] {
            assert_eq!(RecordKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_defaults_to_migration() {
        assert_eq!(RecordKind::parse("repair"), RecordKind::Migration);
    }
}
