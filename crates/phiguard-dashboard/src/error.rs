//! Error types for the dashboard crate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use phiguard_audit::AuditError;

/// Errors that can occur in the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Failed to start the server.
    #[error("failed to start dashboard: {0}")]
    StartupFailed(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A query ran past its deadline.
    #[error("query timed out: {0}")]
    QueryTimeout(String),

    /// Audit engine error.
    #[error("audit error: {0}")]
    Audit(AuditError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AuditError> for DashboardError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Validation(msg) => DashboardError::InvalidRequest(msg),
            AuditError::UnknownResourceType(_) => DashboardError::InvalidRequest(err.to_string()),
            AuditError::QueryTimeout(_) => DashboardError::QueryTimeout(err.to_string()),
            other => DashboardError::Audit(other),
        }
    }
}

impl DashboardError {
    fn status(&self) -> StatusCode {
        match self {
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DashboardError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            DashboardError::StartupFailed(_) => "startup_failed",
            DashboardError::NotFound(_) => "not_found",
            DashboardError::InvalidRequest(_) => "invalid_request",
            DashboardError::QueryTimeout(_) => "query_timeout",
            DashboardError::Audit(AuditError::QueryFailed(_)) => "query_failed",
            DashboardError::Audit(_) => "audit_error",
            DashboardError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.kind(),
            "details": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn audit_errors_map_to_statuses() {
        let cases = [
            (AuditError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                AuditError::UnknownResourceType("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AuditError::QueryTimeout(Duration::from_millis(5)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                AuditError::QueryFailed("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(DashboardError::from(err).status(), status);
        }
    }
}
