use serde::Serialize;

/// Terminal report of one orchestrator run.
///
/// Shaped so it can double as a serverless-function response payload.
/// Callers branch on `status_code`, not on thrown-vs-not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl MigrationResult {
    /// Artifact fast path: nothing on disk to apply.
    pub fn no_pending() -> Self {
        Self {
            status_code: 200,
            body: "No migrations to run".to_string(),
        }
    }

    pub fn completed() -> Self {
        Self {
            status_code: 200,
            body: "Migration completed successfully".to_string(),
        }
    }

    /// Retry exhaustion, downgraded to a result instead of an error.
    pub fn failed(attempts: u32) -> Self {
        Self {
            status_code: 500,
            body: format!("Migration failed after {attempts} attempts"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
