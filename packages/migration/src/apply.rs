use std::collections::HashSet;

use tracing::{debug, info};

use db_access::sea_orm::DatabaseBackend;
use db_access::{DbError, DbHandle};

use crate::store::MigrationSet;

/// Bookkeeping table recording which migration tags have been applied.
pub const TRACKING_TABLE: &str = "schema_migrations";

/// Outcome of one application pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Applies every migration in `set` that the database has not recorded yet,
/// in manifest order. Safe to re-run: a fully migrated database yields
/// `applied == 0`.
pub async fn apply_pending(handle: &DbHandle, set: &MigrationSet) -> Result<ApplySummary, DbError> {
    ensure_tracking_table(handle).await?;

    let applied: HashSet<String> = handle
        .query_strings(&format!("SELECT tag FROM {TRACKING_TABLE}"), "tag")
        .await?
        .into_iter()
        .collect();

    let mut summary = ApplySummary::default();
    for migration in &set.entries {
        if applied.contains(&migration.tag) {
            debug!("migration=skipped tag={}", migration.tag);
            summary.skipped += 1;
            continue;
        }
        let sql = migration.load_sql()?;
        handle.execute(&sql).await?;
        handle
            .execute(&format!(
                "INSERT INTO {TRACKING_TABLE} (tag) VALUES ('{}')",
                migration.tag
            ))
            .await?;
        info!("migration=applied tag={}", migration.tag);
        summary.applied += 1;
    }

    info!(
        "migrations=done applied={} skipped={}",
        summary.applied, summary.skipped
    );
    Ok(summary)
}

async fn ensure_tracking_table(handle: &DbHandle) -> Result<(), DbError> {
    let ddl = match handle.backend() {
        DatabaseBackend::Sqlite => format!(
            "CREATE TABLE IF NOT EXISTS {TRACKING_TABLE} (id INTEGER PRIMARY KEY AUTOINCREMENT, tag TEXT UNIQUE NOT NULL, applied_at TEXT NOT NULL DEFAULT (datetime('now')))"
        ),
        _ => format!(
            "CREATE TABLE IF NOT EXISTS {TRACKING_TABLE} (id BIGSERIAL PRIMARY KEY, tag TEXT UNIQUE NOT NULL, applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
        ),
    };
    handle.execute(&ddl).await?;
    Ok(())
}
