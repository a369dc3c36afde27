use thiserror::Error;

/// Classification consumed by the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying with backoff.
    Transient,
    /// Propagate immediately, no retry, no delay.
    Fatal,
}

/// Closed set of failures surfaced by the connection layer.
///
/// `Suspended` is the only transient kind: the managed service is waking
/// from auto-pause and the same call can succeed against a fresh handle.
/// Classification happens on the variant, never on message text.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database is resuming from suspension: {detail}")]
    Suspended { detail: String },

    #[error("configuration error: {message}")]
    ConfigInvalid { message: String },

    #[error("failed to open database connection: {message}")]
    ConnectFailed { message: String },

    #[error("query failed: {message}")]
    QueryFailed { message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<DbError>,
    },
}

impl DbError {
    pub fn suspended(detail: impl Into<String>) -> Self {
        Self::Suspended {
            detail: detail.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// Retry classification: suspension is transient, everything else fatal.
    pub fn classify(&self) -> ErrorClass {
        match self {
            DbError::Suspended { .. } => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.classify() == ErrorClass::Transient
    }
}

impl From<sea_orm::DbErr> for DbError {
    fn from(e: sea_orm::DbErr) -> Self {
        DbError::query(e.to_string())
    }
}
