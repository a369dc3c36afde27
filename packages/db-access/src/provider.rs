//! Mode selection and scoped handle production. The provider owns the retry
//! policy and applies it to the entire acquire-and-call sequence, because the
//! remote service's suspension can surface at any call, not only at connect
//! time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{debug, warn};

use crate::error::DbError;
use crate::facade::{DatabaseFacade, RemoteTarget};
use crate::handle::DbHandle;
use crate::retry::{run_with_retry, RetryError, RetryPolicy};

/// Identity of one logical database plus its remote addressing.
///
/// Immutable once constructed. `with_database` derives the identity of a
/// sibling database behind the same cluster, which is how the operational
/// database is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseIdentity {
    database: String,
    remote: Option<RemoteAddressing>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteAddressing {
    resource_ref: String,
    secret_ref: String,
}

impl DatabaseIdentity {
    /// Identity of a managed database reachable through the remote facade.
    pub fn remote(
        database: impl Into<String>,
        resource_ref: impl Into<String>,
        secret_ref: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            remote: Some(RemoteAddressing {
                resource_ref: resource_ref.into(),
                secret_ref: secret_ref.into(),
            }),
        }
    }

    /// Identity carrying no remote addressing. Valid only in development
    /// mode, where the connection string does the addressing.
    pub fn named(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            remote: None,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            remote: self.remote.clone(),
        }
    }

    pub(crate) fn remote_target(&self) -> Result<RemoteTarget, DbError> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            DbError::config(format!(
                "database '{}' has no remote addressing; remote-facade mode needs a resource and secret reference",
                self.database
            ))
        })?;
        Ok(RemoteTarget {
            resource_ref: remote.resource_ref.clone(),
            secret_ref: remote.secret_ref.clone(),
            database: self.database.clone(),
        })
    }
}

/// Development-mode switches. `development_mode` alone selects pooled mode;
/// the connection string must be present before any connection is attempted.
#[derive(Debug, Clone, Default)]
pub struct DevModeConfig {
    pub connection_string: Option<String>,
    pub development_mode: bool,
}

impl DevModeConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            development_mode: true,
        }
    }

    pub(crate) fn require_connection_string(&self) -> Result<&str, DbError> {
        self.connection_string
            .as_deref()
            .ok_or_else(|| DbError::config("connection string is required in development mode"))
    }
}

/// Produces scoped database handles and guarantees resource release.
#[derive(Clone)]
pub struct ConnectionProvider {
    facade: Option<Arc<dyn DatabaseFacade>>,
    policy: RetryPolicy,
}

impl ConnectionProvider {
    /// Provider for deployments that reach the database through the facade.
    pub fn with_facade(facade: Arc<dyn DatabaseFacade>, policy: RetryPolicy) -> Self {
        Self {
            facade: Some(facade),
            policy,
        }
    }

    /// Provider restricted to pooled (development) connections.
    pub fn direct(policy: RetryPolicy) -> Self {
        Self {
            facade: None,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `action` against a scoped handle for `identity`.
    ///
    /// The whole acquire-and-call sequence is the retried unit: a transient
    /// suspension mid-action replays the action against a freshly acquired
    /// handle. Pooled mode opens its own pool per attempt and closes it on
    /// every exit path before the original outcome is surfaced.
    pub async fn with_connection<R, F, Fut>(
        &self,
        identity: &DatabaseIdentity,
        dev: &DevModeConfig,
        action: F,
    ) -> Result<R, DbError>
    where
        F: Fn(DbHandle) -> Fut,
        Fut: Future<Output = Result<R, DbError>>,
    {
        // Configuration problems fail before the retry loop is entered.
        if dev.development_mode {
            dev.require_connection_string()?;
        } else {
            identity.remote_target()?;
            if self.facade.is_none() {
                return Err(DbError::config(
                    "no remote facade is configured for this provider",
                ));
            }
        }

        run_with_retry(
            &self.policy,
            || self.connect_and_run(identity, dev, &action),
            DbError::classify,
        )
        .await
        .map_err(RetryError::into_db_error)
    }

    async fn connect_and_run<R, F, Fut>(
        &self,
        identity: &DatabaseIdentity,
        dev: &DevModeConfig,
        action: &F,
    ) -> Result<R, DbError>
    where
        F: Fn(DbHandle) -> Fut,
        Fut: Future<Output = Result<R, DbError>>,
    {
        if !dev.development_mode {
            let target = identity.remote_target()?;
            let facade = self.facade.clone().ok_or_else(|| {
                DbError::config("no remote facade is configured for this provider")
            })?;
            debug!("db_connect=facade database={}", target.database);
            action(DbHandle::facade(facade, target)).await
        } else {
            let url = dev.require_connection_string()?;
            let conn = self.open_pool(url).await?;
            debug!("db_connect=pooled database={}", identity.database());
            let outcome = action(DbHandle::pooled(conn.clone())).await;
            // The pool dies with this attempt, success or not, before the
            // original outcome is surfaced.
            if let Err(close_err) = conn.close().await {
                warn!("pool_close=failed err={}", close_err);
            }
            outcome
        }
    }

    async fn open_pool(&self, url: &str) -> Result<DatabaseConnection, DbError> {
        let mut opt = ConnectOptions::new(url);
        opt.min_connections(1)
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(2))
            .sqlx_logging(true);

        Database::connect(opt)
            .await
            .map_err(|e| DbError::connect(e.to_string()))
    }
}
