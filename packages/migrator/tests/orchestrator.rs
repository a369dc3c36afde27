//! End-to-end orchestrator behaviour against a scripted facade and against
//! real SQLite databases in development mode.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use db_access::{ConnectionProvider, DatabaseIdentity, DbError, DevModeConfig, RetryPolicy};
use migrator::{DbContext, MigrationHooks, MigrationResult, Migrator};
use test_support::facade::ScriptedFacade;

fn quick_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2))
}

fn remote_identity() -> DatabaseIdentity {
    DatabaseIdentity::remote("app", "cluster-ref", "secret-ref")
}

/// Lays down one migration plus its manifest and returns the directory.
fn write_artifacts(root: &Path) -> PathBuf {
    let dir = root.join("migrations");
    fs::create_dir(&dir).unwrap();
    fs::write(
        dir.join("manifest.json"),
        r#"{"version":1,"entries":[{"idx":0,"tag":"0001_players"}]}"#,
    )
    .unwrap();
    fs::write(
        dir.join("0001_players.sql"),
        "CREATE TABLE players (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    )
    .unwrap();
    dir
}

#[derive(Default)]
struct CountingHooks {
    success: AtomicU32,
    error: AtomicU32,
    seen_schema: Mutex<Option<String>>,
    seen_error: Mutex<Option<String>>,
}

#[async_trait]
impl MigrationHooks<String> for CountingHooks {
    async fn on_success(&self, schema: &String, _db: &DbContext<'_>) -> Result<(), DbError> {
        self.success.fetch_add(1, Ordering::SeqCst);
        *self.seen_schema.lock().unwrap() = Some(schema.clone());
        Ok(())
    }

    async fn on_error(
        &self,
        _schema: &String,
        error: &DbError,
        _db: &DbContext<'_>,
    ) -> Result<(), DbError> {
        self.error.fetch_add(1, Ordering::SeqCst);
        *self.seen_error.lock().unwrap() = Some(error.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn missing_migrations_dir_is_a_success_without_any_connection() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let facade = Arc::new(ScriptedFacade::new());
    let hooks = Arc::new(CountingHooks::default());

    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(tmp.path().join("missing"))
    .with_hooks(hooks.clone());

    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::no_pending());
    assert_eq!(result.body, "No migrations to run");
    assert_eq!(facade.call_count(), 0);
    assert_eq!(hooks.success.load(Ordering::SeqCst), 0);
    assert_eq!(hooks.error.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn directory_without_manifest_is_the_same_fast_path() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("migrations");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("0001_players.sql"), "CREATE TABLE players (id INTEGER)").unwrap();

    let facade = Arc::new(ScriptedFacade::new());
    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir);

    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::no_pending());
    assert_eq!(facade.call_count(), 0);
}

#[tokio::test]
async fn ensure_database_creates_only_when_absent() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());

    let facade = Arc::new(ScriptedFacade::new());
    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir);

    // First run: no database registered yet, no migrations recorded.
    facade.push_query(Ok(vec![]));
    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::completed());

    let creates = |sql_log: Vec<String>| {
        sql_log
            .iter()
            .filter(|s| s.contains("CREATE DATABASE"))
            .count()
    };
    assert_eq!(creates(facade.executed_sql()), 1);

    // Second run: database present, migration already recorded. No second
    // create statement may be issued.
    facade.push_query(Ok(vec!["app".into()]));
    facade.push_query(Ok(vec!["0001_players".into()]));
    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::completed());
    assert_eq!(creates(facade.executed_sql()), 1);
}

#[tokio::test]
async fn transient_exhaustion_becomes_a_500_result() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());

    let facade = Arc::new(ScriptedFacade::new());
    let hooks = Arc::new(CountingHooks::default());

    // Ensure-database sees the database; every migration attempt then hits
    // the service still resuming.
    facade.push_query(Ok(vec!["app".into()]));
    for _ in 0..3 {
        facade.push_query(Err(DbError::suspended("resuming after being auto-paused")));
    }

    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir)
    .with_hooks(hooks.clone());

    let result = migrator.run().await.unwrap();
    assert_eq!(result.status_code, 500);
    assert_eq!(result.body, "Migration failed after 3 attempts");
    assert_eq!(hooks.success.load(Ordering::SeqCst), 0);
    assert_eq!(hooks.error.load(Ordering::SeqCst), 1);
    let seen = hooks.seen_error.lock().unwrap().clone().unwrap();
    assert!(seen.contains("3 attempts"));
}

#[tokio::test]
async fn fatal_migration_error_propagates_and_skips_hooks() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());

    let facade = Arc::new(ScriptedFacade::new());
    let hooks = Arc::new(CountingHooks::default());

    facade.push_query(Ok(vec!["app".into()])); // database exists
    facade.push_exec(Ok(0)); // tracking table DDL
    facade.push_exec(Err(DbError::query("syntax error at or near"))); // migration body

    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir)
    .with_hooks(hooks.clone());

    let err = migrator.run().await.unwrap_err();
    assert!(matches!(err, DbError::QueryFailed { .. }));
    assert_eq!(hooks.success.load(Ordering::SeqCst), 0);
    assert_eq!(hooks.error.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_run_invokes_success_hook_exactly_once() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());

    let facade = Arc::new(ScriptedFacade::new());
    let hooks = Arc::new(CountingHooks::default());

    facade.push_query(Ok(vec!["app".into()]));

    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade.clone(), quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir)
    .with_hooks(hooks.clone());

    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::completed());
    assert_eq!(result.body, "Migration completed successfully");
    assert_eq!(hooks.success.load(Ordering::SeqCst), 1);
    assert_eq!(
        hooks.seen_schema.lock().unwrap().as_deref(),
        Some("app-schema")
    );
}

struct SeedHooks;

#[async_trait]
impl MigrationHooks<String> for SeedHooks {
    async fn on_success(&self, _schema: &String, db: &DbContext<'_>) -> Result<(), DbError> {
        db.with_target(|handle| async move {
            handle
                .execute("INSERT INTO players (name) VALUES ('ada')")
                .await
                .map(|_| ())
        })
        .await
    }
}

#[tokio::test]
async fn dev_mode_migrates_a_real_database_and_seeds_it() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());
    let url = format!("sqlite://{}?mode=rwc", tmp.path().join("app.db").display());
    let dev = DevModeConfig::enabled(url);

    let migrator = Migrator::new(
        ConnectionProvider::direct(quick_policy()),
        DatabaseIdentity::named("app"),
        "app-schema".to_string(),
    )
    .with_dev(dev.clone())
    .with_migrations_dir(&dir)
    .with_hooks(Arc::new(SeedHooks));

    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::completed());

    // The seeded row is visible through a fresh provider.
    let verify = ConnectionProvider::direct(quick_policy());
    let names = verify
        .with_connection(&DatabaseIdentity::named("app"), &dev, |handle| async move {
            handle.query_strings("SELECT name FROM players", "name").await
        })
        .await
        .unwrap();
    assert_eq!(names, vec!["ada".to_string()]);

    // A second run is a no-op for the schema and still reports success.
    let result = migrator.run().await.unwrap();
    assert_eq!(result, MigrationResult::completed());
    let tags = verify
        .with_connection(&DatabaseIdentity::named("app"), &dev, |handle| async move {
            handle
                .query_strings("SELECT tag FROM schema_migrations", "tag")
                .await
        })
        .await
        .unwrap();
    assert_eq!(tags, vec!["0001_players".to_string()]);
}

struct FailingHooks;

#[async_trait]
impl MigrationHooks<String> for FailingHooks {
    async fn on_success(&self, _schema: &String, _db: &DbContext<'_>) -> Result<(), DbError> {
        Err(DbError::query("seed failed"))
    }
}

#[tokio::test]
async fn hook_failures_are_not_caught() {
    test_support::logging::init();
    let tmp = TempDir::new().unwrap();
    let dir = write_artifacts(tmp.path());

    let facade = Arc::new(ScriptedFacade::new());
    facade.push_query(Ok(vec!["app".into()]));

    let migrator = Migrator::new(
        ConnectionProvider::with_facade(facade, quick_policy()),
        remote_identity(),
        "app-schema".to_string(),
    )
    .with_migrations_dir(&dir)
    .with_hooks(Arc::new(FailingHooks));

    let err = migrator.run().await.unwrap_err();
    assert!(matches!(&err, DbError::QueryFailed { message } if message == "seed failed"));
}
