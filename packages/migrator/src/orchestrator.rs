//! The provisioning-and-migration state machine. One run walks artifact
//! check, ensure-database, migrate-with-retry, hooks, in that order; no
//! state survives between runs.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, trace};

use db_access::config::{validate_identifier, DEFAULT_OPERATIONAL_DATABASE};
use db_access::sea_orm::DatabaseBackend;
use db_access::{ConnectionProvider, DatabaseIdentity, DbError, DevModeConfig};
use migration::{apply_pending, MigrationSet, MigrationStore};

use crate::hooks::{DbContext, MigrationHooks};
use crate::result::MigrationResult;

/// Default location of migration artifacts, relative to the directory the
/// orchestrator is invoked in (matching where deployment copies them).
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Top-level provisioning-and-migration workflow for one target database.
///
/// The schema value is opaque to the orchestrator; it is only threaded
/// through to the hooks.
pub struct Migrator<S> {
    provider: ConnectionProvider,
    identity: DatabaseIdentity,
    dev: DevModeConfig,
    schema: S,
    migrations_dir: PathBuf,
    operational_database: String,
    hooks: Option<Arc<dyn MigrationHooks<S>>>,
}

impl<S: Send + Sync> Migrator<S> {
    pub fn new(provider: ConnectionProvider, identity: DatabaseIdentity, schema: S) -> Self {
        Self {
            provider,
            identity,
            dev: DevModeConfig::disabled(),
            schema,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            operational_database: DEFAULT_OPERATIONAL_DATABASE.to_string(),
            hooks: None,
        }
    }

    pub fn with_dev(mut self, dev: DevModeConfig) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_operational_database(mut self, name: impl Into<String>) -> Self {
        self.operational_database = name.into();
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn MigrationHooks<S>>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Run the workflow once.
    ///
    /// Retry exhaustion comes back as a `500` result, in the ensure-database
    /// step and the migration step alike; configuration errors and
    /// non-transient database errors are returned as `Err`. Hooks run
    /// exactly once, after the result is final, and their failures
    /// propagate.
    pub async fn run(&self) -> Result<MigrationResult, DbError> {
        info!(
            "migrate=start database={} development_mode={}",
            self.identity.database(),
            self.dev.development_mode
        );

        let store = MigrationStore::new(&self.migrations_dir);
        let Some(set) = store.discover()? else {
            info!(
                "migrate=skipped reason=no_artifacts dir={}",
                self.migrations_dir.display()
            );
            return Ok(MigrationResult::no_pending());
        };

        validate_identifier(self.identity.database())?;
        validate_identifier(&self.operational_database)?;

        let outcome = match self.ensure_database_exists().await {
            Ok(()) => self.apply_migrations(&set).await,
            Err(e) => Err(e),
        };

        let (result, terminal) = match outcome {
            Ok(()) => (MigrationResult::completed(), None),
            Err(DbError::RetriesExhausted { attempts, last }) => {
                let err = DbError::RetriesExhausted { attempts, last };
                error!("migrate=failed attempts={} err={}", attempts, err);
                (MigrationResult::failed(attempts), Some(err))
            }
            Err(e) => return Err(e),
        };

        if let Some(hooks) = &self.hooks {
            let db = DbContext::new(&self.provider, &self.identity, &self.dev);
            match &terminal {
                None => hooks.on_success(&self.schema, &db).await?,
                Some(err) => hooks.on_error(&self.schema, err, &db).await?,
            }
        }

        info!("migrate=done status={}", result.status_code);
        Ok(result)
    }

    /// Idempotent creation of the target database, performed against the
    /// operational database. On SQLite backends the engine creates the
    /// database on connect, so the probe is skipped.
    async fn ensure_database_exists(&self) -> Result<(), DbError> {
        let admin = self.identity.with_database(self.operational_database.as_str());
        let database = self.identity.database().to_string();

        self.provider
            .with_connection(&admin, &self.dev, |handle| {
                let database = database.clone();
                async move {
                    if handle.backend() != DatabaseBackend::Postgres {
                        trace!("ensure_database=skipped backend=non_postgres");
                        return Ok(());
                    }
                    let existing = handle
                        .query_strings(
                            &format!(
                                "SELECT datname FROM pg_database WHERE datname = '{database}'"
                            ),
                            "datname",
                        )
                        .await?;
                    if existing.is_empty() {
                        handle
                            .execute(&format!("CREATE DATABASE \"{database}\""))
                            .await?;
                        info!("ensure_database=created database={}", database);
                    } else {
                        info!("ensure_database=present database={}", database);
                    }
                    Ok(())
                }
            })
            .await
    }

    /// Apply pending migrations against the target database. The provider
    /// retries the whole pass on suspension, against a fresh handle each
    /// attempt.
    async fn apply_migrations(&self, set: &MigrationSet) -> Result<(), DbError> {
        self.provider
            .with_connection(&self.identity, &self.dev, |handle| {
                let set = set.clone();
                async move { apply_pending(&handle, &set).await.map(|_| ()) }
            })
            .await
    }
}
