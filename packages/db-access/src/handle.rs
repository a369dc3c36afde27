use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::error::DbError;
use crate::facade::{DatabaseFacade, RemoteTarget};

/// Scoped handle produced by the connection provider for one action.
///
/// Facade handles are stateless per call. Pooled handles ride on the pool
/// owned by the in-flight `with_connection` attempt and stop working once
/// that attempt closes it.
#[derive(Clone)]
pub struct DbHandle {
    inner: HandleInner,
}

#[derive(Clone)]
enum HandleInner {
    Facade {
        facade: Arc<dyn DatabaseFacade>,
        target: RemoteTarget,
    },
    Pooled {
        conn: DatabaseConnection,
    },
}

impl DbHandle {
    pub fn facade(facade: Arc<dyn DatabaseFacade>, target: RemoteTarget) -> Self {
        Self {
            inner: HandleInner::Facade { facade, target },
        }
    }

    pub fn pooled(conn: DatabaseConnection) -> Self {
        Self {
            inner: HandleInner::Pooled { conn },
        }
    }

    /// Backend the handle executes against. The facade always fronts the
    /// managed Postgres service.
    pub fn backend(&self) -> DatabaseBackend {
        match &self.inner {
            HandleInner::Facade { .. } => DatabaseBackend::Postgres,
            HandleInner::Pooled { conn } => conn.get_database_backend(),
        }
    }

    /// Execute a statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, DbError> {
        match &self.inner {
            HandleInner::Facade { facade, target } => facade.execute(target, sql).await,
            HandleInner::Pooled { conn } => {
                let res = conn.execute_unprepared(sql).await?;
                Ok(res.rows_affected())
            }
        }
    }

    /// Run a query and collect one text column from every returned row.
    pub async fn query_strings(&self, sql: &str, column: &str) -> Result<Vec<String>, DbError> {
        match &self.inner {
            HandleInner::Facade { facade, target } => {
                facade.query_strings(target, sql, column).await
            }
            HandleInner::Pooled { conn } => {
                let stmt = Statement::from_string(conn.get_database_backend(), sql.to_owned());
                let rows = conn.query_all(stmt).await?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    out.push(row.try_get::<String>("", column)?);
                }
                Ok(out)
            }
        }
    }
}
