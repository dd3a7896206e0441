//! Request handlers for the API.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use phiguard_audit::{
    AccessDecision, AccessRequest, AuditEntryDetail, QueryResult, RawEvent, RetentionDecision,
    SweepReport,
};

use crate::api_types::{AuditLogQuery, HealthResponse, RecordResponse, RetentionEvaluateQuery};
use crate::error::DashboardError;
use crate::state::AppState;

type ApiResult<T> = Result<T, DashboardError>;

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|e| DashboardError::InvalidRequest(e.body_text()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(b)| b)
        .map_err(|e| DashboardError::InvalidRequest(e.body_text()))
}

// =============================================================================
// Health
// =============================================================================

/// `GET /healthz`
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.engine();
    let stored_entries = match engine.storage().count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not count stored entries");
            None
        }
    };
    let recorder = engine.recorder();
    let status = if stored_entries.is_some() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_secs: state.uptime_secs(),
        stored_entries,
        persistence_failures: recorder.persistence_failures(),
        escalation_failures: recorder.escalation_failures(),
    })
}

// =============================================================================
// Audit Logs
// =============================================================================

/// `POST /api/audit-logs`
pub async fn record_event(
    State(state): State<AppState>,
    body: Result<Json<RawEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    let raw = json_body(body)?;
    let result = state.engine().recorder().record(raw).await?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// `GET /api/audit-logs`
pub async fn list_audit_logs(
    State(state): State<AppState>,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> ApiResult<Json<QueryResult>> {
    let query = query_params(query)?;
    let result = state
        .engine()
        .query()
        .query(&query.filter(), &query.page_request())
        .await?;
    Ok(Json(result))
}

/// `GET /api/audit-logs/export`
pub async fn export_audit_logs(
    State(state): State<AppState>,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let query = query_params(query)?;
    let format = query.format.unwrap_or_default();
    let file = state.engine().export(&query.filter(), format).await?;

    tracing::info!(
        format = %format,
        filename = %file.filename,
        bytes = file.body.len(),
        "Exported audit logs"
    );

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.body,
    )
        .into_response())
}

/// `GET /api/audit-logs/{id}`
pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AuditEntryDetail>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| DashboardError::InvalidRequest(format!("'{}' is not a valid entry id", id)))?;
    state
        .engine()
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| DashboardError::NotFound(format!("audit entry {}", id)))
}

// =============================================================================
// Access Control
// =============================================================================

/// `POST /api/access/check`
pub async fn check_access(
    State(state): State<AppState>,
    body: Result<Json<AccessRequest>, JsonRejection>,
) -> ApiResult<Json<AccessDecision>> {
    let request = json_body(body)?;
    let decision = state.engine().access().check_access(&request).await?;
    Ok(Json(decision))
}

// =============================================================================
// Retention
// =============================================================================

/// `GET /api/retention/evaluate`
pub async fn evaluate_retention(
    State(state): State<AppState>,
    query: Result<Query<RetentionEvaluateQuery>, QueryRejection>,
) -> ApiResult<Json<RetentionDecision>> {
    let query = query_params(query)?;
    let decision = state
        .engine()
        .retention()
        .evaluate(&query.resource_type, query.created_at)?;
    Ok(Json(decision))
}

/// `POST /api/retention/sweep`
pub async fn run_sweep(State(state): State<AppState>) -> ApiResult<Json<SweepReport>> {
    let report = state.engine().retention().run_sweep().await?;
    Ok(Json(report))
}
