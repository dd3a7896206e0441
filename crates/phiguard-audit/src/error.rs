//! Error types for the audit crate.
//!
//! The write path and the read path treat failures differently. Read-path
//! errors (`QueryTimeout`, `QueryFailed`, storage errors during queries) always
//! reach the caller. Write-path persistence and escalation failures are
//! degraded: the recorder logs them and reports them as warnings, so audit
//! logging never blocks the business operation that produced the event.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The raw event is malformed or incomplete. Never persisted.
    #[error("invalid audit event: {0}")]
    Validation(String),

    /// The resource type is not in the classification registry.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),

    /// The store was unreachable or rejected the write.
    #[error("failed to persist audit entry: {0}")]
    PersistenceFailure(String),

    /// A query ran past its deadline and was abandoned.
    #[error("audit query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// A query could not be answered.
    #[error("failed to query audit entries: {0}")]
    QueryFailed(String),

    /// The escalation channel rejected or dropped a notification.
    #[error("escalation failed: {0}")]
    EscalationFailed(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV encoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        AuditError::Storage(err.to_string())
    }
}

impl AuditError {
    /// Whether this error belongs to the read path and must reach the caller as-is.
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::QueryTimeout(_) | Self::QueryFailed(_))
    }
}
