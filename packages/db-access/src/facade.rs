use async_trait::async_trait;

use crate::error::DbError;

/// Addressing for one remote-facade call: the linked cluster resource, the
/// secret that unlocks it, and the logical database the statement runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub resource_ref: String,
    pub secret_ref: String,
    pub database: String,
}

/// Stateless data-access facade over the managed database service.
///
/// One implementation exists per deployment target and is supplied by the
/// caller; this crate only defines the seam. Implementations must surface
/// [`DbError::Suspended`] when the service reports it is resuming from
/// auto-pause, so the retry layer can classify the failure as transient.
/// Calls are connectionless; there is nothing to tear down between them.
#[async_trait]
pub trait DatabaseFacade: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, target: &RemoteTarget, sql: &str) -> Result<u64, DbError>;

    /// Run a query and collect one text column from every returned row.
    async fn query_strings(
        &self,
        target: &RemoteTarget,
        sql: &str,
        column: &str,
    ) -> Result<Vec<String>, DbError>;
}
