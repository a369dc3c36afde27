//! Scripted stand-in for the remote data facade.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use db_access::{DatabaseFacade, DbError, RemoteTarget};

/// One recorded facade invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacadeCall {
    pub kind: CallKind,
    pub database: String,
    pub sql: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    Query,
}

/// Records every call and serves scripted responses in FIFO order per
/// method. An empty queue yields a benign default (zero rows affected, no
/// rows returned), so success paths only need the interesting responses
/// scripted.
#[derive(Default)]
pub struct ScriptedFacade {
    calls: Mutex<Vec<FacadeCall>>,
    exec_responses: Mutex<VecDeque<Result<u64, DbError>>>,
    query_responses: Mutex<VecDeque<Result<Vec<String>, DbError>>>,
}

impl ScriptedFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exec(&self, response: Result<u64, DbError>) {
        self.exec_responses.lock().unwrap().push_back(response);
    }

    pub fn push_query(&self, response: Result<Vec<String>, DbError>) {
        self.query_responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<FacadeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn query_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == CallKind::Query)
            .count()
    }

    /// SQL of every `execute` call, in invocation order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == CallKind::Execute)
            .map(|c| c.sql.clone())
            .collect()
    }

    fn record(&self, kind: CallKind, target: &RemoteTarget, sql: &str) {
        self.calls.lock().unwrap().push(FacadeCall {
            kind,
            database: target.database.clone(),
            sql: sql.to_string(),
        });
    }
}

#[async_trait]
impl DatabaseFacade for ScriptedFacade {
    async fn execute(&self, target: &RemoteTarget, sql: &str) -> Result<u64, DbError> {
        self.record(CallKind::Execute, target, sql);
        self.exec_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn query_strings(
        &self,
        target: &RemoteTarget,
        sql: &str,
        _column: &str,
    ) -> Result<Vec<String>, DbError> {
        self.record(CallKind::Query, target, sql);
        self.query_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
