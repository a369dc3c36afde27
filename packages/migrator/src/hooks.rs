use std::future::Future;

use async_trait::async_trait;

use db_access::{ConnectionProvider, DatabaseIdentity, DbError, DbHandle, DevModeConfig};

/// Connection context handed to hooks so they can run queries against the
/// already-provisioned target database.
pub struct DbContext<'a> {
    provider: &'a ConnectionProvider,
    identity: &'a DatabaseIdentity,
    dev: &'a DevModeConfig,
}

impl<'a> DbContext<'a> {
    pub(crate) fn new(
        provider: &'a ConnectionProvider,
        identity: &'a DatabaseIdentity,
        dev: &'a DevModeConfig,
    ) -> Self {
        Self {
            provider,
            identity,
            dev,
        }
    }

    pub fn identity(&self) -> &DatabaseIdentity {
        self.identity
    }

    /// Run `action` against the target database with the provider's usual
    /// retry semantics.
    pub async fn with_target<R, F, Fut>(&self, action: F) -> Result<R, DbError>
    where
        F: Fn(DbHandle) -> Fut,
        Fut: Future<Output = Result<R, DbError>>,
    {
        self.provider
            .with_connection(self.identity, self.dev, action)
            .await
    }
}

/// Optional callbacks invoked exactly once after the run's result is final:
/// `on_success` for a 200 (seeding, cache warming), `on_error` for a 500
/// (alerting). Failures are not caught here; they surface to the
/// orchestrator's caller.
#[async_trait]
pub trait MigrationHooks<S: Send + Sync>: Send + Sync {
    async fn on_success(&self, _schema: &S, _db: &DbContext<'_>) -> Result<(), DbError> {
        Ok(())
    }

    async fn on_error(
        &self,
        _schema: &S,
        _error: &DbError,
        _db: &DbContext<'_>,
    ) -> Result<(), DbError> {
        Ok(())
    }
}
