//! End-to-end connection lifecycle tests against throwaway SQLite databases.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::Row;
use tempfile::TempDir;

use schemaflow::engine::{SchemaHistory, DEFAULT_HISTORY_TABLE};
use schemaflow::{
    ConnectionError, ConnectionSettings, ConnectionState, DataSource, DefaultMigrator,
    DriverPoolBuilder, MigrateError, MigratedConnection, Migrator, NoOpMigrator, PluggableConnection,
    PoolBuilder, PoolError, PoolSettings,
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .ok();
}

fn sqlite_url(tmp: &TempDir, name: &str) -> String {
    format!("sqlite://{}?mode=rwc", tmp.path().join(name).display())
}

fn write_script(dir: &Path, name: &str, sql: &str) {
    fs::create_dir_all(dir).expect("create location");
    fs::write(dir.join(name), sql).expect("write script");
}

fn scripts_dir(tmp: &TempDir) -> PathBuf {
    let dir = tmp.path().join("scripts");
    write_script(
        &dir,
        "V1__create_accounts.sql",
        "CREATE TABLE accounts (id BIGINT PRIMARY KEY, name VARCHAR(100));",
    );
    dir
}

#[derive(Default)]
struct CountingMigrator {
    runs: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Migrator for CountingMigrator {
    async fn migrate(&self, _source: &DataSource) -> Result<(), MigrateError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingBuilder {
    inner: DriverPoolBuilder,
    builds: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl PoolBuilder for CountingBuilder {
    async fn build(&self) -> Result<DataSource, PoolError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build().await
    }
}

async fn user_table_count(source: &DataSource) -> i64 {
    let row = sqlx::query(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(source.pool())
    .await
    .unwrap();
    row.try_get(0).unwrap()
}

#[tokio::test]
async fn initialize_runs_the_migration_before_the_connection_is_ready() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let migrator = DefaultMigrator::new()
        .with_locations([format!("filesystem:{}", scripts_dir(&tmp).display())]);

    let mut connection =
        MigratedConnection::new(sqlite_url(&tmp, "app.db")).with_migrator(Arc::new(migrator));
    connection.initialize().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Ready);
    let source = connection.data_source().unwrap();
    assert!(SchemaHistory::new(DEFAULT_HISTORY_TABLE)
        .exists(source)
        .await
        .unwrap());
    sqlx::query("INSERT INTO accounts (id, name) VALUES (1, 'a')")
        .execute(source.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn unconfigured_connection_behaves_like_an_explicit_noop() {
    let tmp = tempfile::tempdir().unwrap();

    let mut unconfigured = MigratedConnection::new(sqlite_url(&tmp, "left.db"));
    let mut explicit = MigratedConnection::new(sqlite_url(&tmp, "right.db"))
        .with_migrator(NoOpMigrator::shared());

    unconfigured.initialize().await.unwrap();
    explicit.initialize().await.unwrap();

    for connection in [&unconfigured, &explicit] {
        assert_eq!(connection.state(), ConnectionState::Ready);
        let source = connection.data_source().unwrap();
        assert_eq!(user_table_count(source).await, 0);
    }
}

#[tokio::test]
async fn pool_failure_fails_initialization_without_running_the_migrator() {
    let runs = Arc::new(AtomicUsize::new(0));
    let migrator = CountingMigrator { runs: runs.clone() };

    let mut connection =
        MigratedConnection::new("nonsense://nowhere").with_migrator(Arc::new(migrator));
    let err = connection.initialize().await.unwrap_err();

    assert_eq!(connection.state(), ConnectionState::Failed);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let ConnectionError::Initialization { source } = err else {
        panic!("expected initialization error");
    };
    assert!(source.downcast_ref::<PoolError>().is_some());
}

#[tokio::test]
async fn migration_failure_fails_initialization_with_the_cause_preserved() {
    let tmp = tempfile::tempdir().unwrap();
    let migrator = DefaultMigrator::new().with_locations([format!(
        "filesystem:{}",
        tmp.path().join("nowhere").display()
    )]);

    let mut connection =
        MigratedConnection::new(sqlite_url(&tmp, "app.db")).with_migrator(Arc::new(migrator));
    let err = connection.initialize().await.unwrap_err();

    assert_eq!(connection.state(), ConnectionState::Failed);
    assert!(connection.data_source().is_err());
    let ConnectionError::Initialization { source } = err else {
        panic!("expected initialization error");
    };
    assert!(source.downcast_ref::<MigrateError>().is_some());
}

#[tokio::test]
async fn reinitializing_after_a_migration_failure_starts_from_scratch() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let url = sqlite_url(&tmp, "app.db");

    // A pre-existing, unmanaged table makes the first attempt fail.
    let seed = DataSource::connect(&url).await.unwrap();
    sqlx::query("CREATE TABLE legacy_accounts (id BIGINT PRIMARY KEY)")
        .execute(seed.pool())
        .await
        .unwrap();
    seed.close().await;

    let scripts = tmp.path().join("scripts");
    write_script(
        &scripts,
        "V2__create_audit_log.sql",
        "CREATE TABLE audit_log (id BIGINT PRIMARY KEY);",
    );
    let location = format!("filesystem:{}", scripts.display());

    let mut connection = MigratedConnection::new(url).with_migrator(Arc::new(
        DefaultMigrator::new()
            .with_locations([location.as_str()])
            .with_baseline(false),
    ));
    connection.initialize().await.unwrap_err();
    assert_eq!(connection.state(), ConnectionState::Failed);

    // Correct the configuration and try again: pool setup and migration both
    // re-run, and this time the schema is baselined first.
    connection.set_migrator(Arc::new(
        DefaultMigrator::new()
            .with_locations([location.as_str()])
            .with_baseline(true),
    ));
    connection.initialize().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Ready);

    let records = SchemaHistory::new(DEFAULT_HISTORY_TABLE)
        .records(connection.data_source().unwrap())
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn the_migrator_runs_once_per_initialization_attempt() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let mut connection = MigratedConnection::new(sqlite_url(&tmp, "app.db"))
        .with_migrator(Arc::new(CountingMigrator { runs: runs.clone() }));
    connection.initialize().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    connection.initialize().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pluggable_connections_share_the_same_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let builds = Arc::new(AtomicUsize::new(0));
    let builder = CountingBuilder {
        inner: DriverPoolBuilder::new(sqlite_url(&tmp, "app.db"), PoolSettings::default()),
        builds: builds.clone(),
    };
    let migrator = DefaultMigrator::new()
        .with_locations([format!("filesystem:{}", scripts_dir(&tmp).display())]);

    let mut connection = PluggableConnection::new(builder).with_migrator(Arc::new(migrator));
    connection.initialize().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Ready);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(SchemaHistory::new(DEFAULT_HISTORY_TABLE)
        .exists(connection.data_source().unwrap())
        .await
        .unwrap());

    // Re-initialization rebuilds the externally supplied pool too.
    connection.initialize().await.unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn closed_connections_require_a_fresh_initialize() {
    let tmp = tempfile::tempdir().unwrap();
    let mut connection = MigratedConnection::new(sqlite_url(&tmp, "app.db"));
    connection.initialize().await.unwrap();

    connection.close().await;
    assert_eq!(connection.state(), ConnectionState::Unconfigured);
    assert!(matches!(
        connection.data_source().unwrap_err(),
        ConnectionError::NotReady { .. }
    ));

    connection.initialize().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn legacy_inline_settings_still_migrate_through_the_adapter() {
    let tmp = tempfile::tempdir().unwrap();
    let location = format!("filesystem:{}", scripts_dir(&tmp).display());

    let settings: ConnectionSettings = serde_json::from_value(serde_json::json!({
        "url": sqlite_url(&tmp, "app.db"),
        "locations": [location],
        "baseline": false
    }))
    .unwrap();

    let mut connection = settings.connection();
    connection.initialize().await.unwrap();

    assert!(SchemaHistory::new(DEFAULT_HISTORY_TABLE)
        .exists(connection.data_source().unwrap())
        .await
        .unwrap());
}

#[tokio::test]
async fn settings_without_migration_resolve_to_the_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let settings: ConnectionSettings =
        serde_json::from_value(serde_json::json!({ "url": sqlite_url(&tmp, "app.db") }))
            .unwrap();

    let mut connection = settings.connection();
    connection.initialize().await.unwrap();

    let source = connection.data_source().unwrap();
    assert_eq!(user_table_count(source).await, 0);
}
