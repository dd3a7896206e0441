//! Route definitions for the API.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/api/audit-logs",
            get(handlers::list_audit_logs).post(handlers::record_event),
        )
        .route("/api/audit-logs/export", get(handlers::export_audit_logs))
        .route("/api/audit-logs/{id}", get(handlers::get_audit_log))
        .route("/api/access/check", post(handlers::check_access))
        .route("/api/retention/evaluate", get(handlers::evaluate_retention))
        .route("/api/retention/sweep", post(handlers::run_sweep))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
