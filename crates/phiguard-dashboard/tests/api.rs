//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use phiguard_audit::{
    AuditEngine, MemoryColdStore, MemoryStorage, NoopNotifier, StaticRoleResolver,
};
use phiguard_core::PhiguardConfig;
use phiguard_dashboard::{AppState, create_router};

fn app_with(config: PhiguardConfig) -> Router {
    let resolver = Arc::new(StaticRoleResolver::from_config(&config.access));
    let engine = AuditEngine::with_parts(
        config,
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryColdStore::new()),
        Arc::new(NoopNotifier),
        resolver,
    );
    create_router(AppState::new(Arc::new(engine)))
}

fn app() -> Router {
    app_with(PhiguardConfig::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn lab_view(user: &str) -> Value {
    json!({
        "event_type": "data_access",
        "user_id": user,
        "resource_type": "lab_reports",
        "resource_id": "report-1",
        "action": "view",
        "context": { "off_hours": false }
    })
}

#[tokio::test]
async fn healthz_reports_counters() {
    let app = app();
    let (status, body) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stored_entries"], 0);
    assert_eq!(body["persistence_failures"], 0);
    assert_eq!(body["escalation_failures"], 0);
}

#[tokio::test]
async fn recorded_event_can_be_fetched_with_analysis() {
    let app = app();
    let (status, created) = post_json(&app, "/api/audit-logs", lab_view("dr_lee")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["persisted"], true);
    assert_eq!(created["risk_level"], "low");

    let id = created["id"].as_str().unwrap();
    let (status, detail) = get_json(&app, &format!("/api/audit-logs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["entry"]["id"], id);
    assert_eq!(detail["entry"]["user_id"], "dr_lee");
    assert_eq!(detail["state"], "active");
    assert!(detail["security_analysis"]["threat_level"].is_string());
    assert!(detail["related_events"].is_array());
}

#[tokio::test]
async fn missing_required_fields_are_rejected() {
    let app = app();
    let (status, body) = post_json(
        &app,
        "/api/audit-logs",
        json!({ "resource_type": "lab_reports" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("event_type"), "{details}");
    assert!(details.contains("user_id"), "{details}");
    assert!(details.contains("action"), "{details}");

    let (_, health) = get_json(&app, "/healthz").await;
    assert_eq!(health["stored_entries"], 0);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/audit-logs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn query_returns_envelope() {
    let app = app();
    for user in ["dr_lee", "dr_lee", "nurse_ray"] {
        post_json(&app, "/api/audit-logs", lab_view(user)).await;
    }

    let (status, body) = get_json(&app, "/api/audit-logs?userId=dr_lee&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);
    assert_eq!(body["filters"]["user_id"], "dr_lee");
    assert_eq!(body["statistics"]["total_events"], 2);
    assert_eq!(body["statistics"]["unique_users"], 1);
}

#[tokio::test]
async fn query_with_bad_parameter_is_rejected() {
    let app = app();
    let (status, body) = get_json(&app, "/api/audit-logs?risk_level=extreme").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let app = app();
    post_json(&app, "/api/audit-logs", lab_view("dr_lee")).await;

    let request = Request::builder()
        .uri("/api/audit-logs/export?format=csv&time_range=7d")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"audit-logs-7d-"));
    assert!(disposition.ends_with(".csv\""));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut reader = csv::Reader::from_reader(body.as_ref());
    let header_row = reader.headers().unwrap().clone();
    assert_eq!(&header_row[0], "id");
    let rows: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][3], "dr_lee");
}

#[tokio::test]
async fn json_export_carries_metadata() {
    let app = app();
    post_json(&app, "/api/audit-logs", lab_view("dr_lee")).await;
    let (status, body) = get_json(&app, "/api/audit-logs/export?format=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["exported_at"].is_string());
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn denied_access_is_audited() {
    let mut config = PhiguardConfig::default();
    config
        .access
        .principals
        .insert("front_desk".into(), "receptionist".into());
    let app = app_with(config);

    let (status, decision) = post_json(
        &app,
        "/api/access/check",
        json!({
            "user_id": "front_desk",
            "resource_type": "medical_records",
            "action": "view"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["allowed"], false);
    assert_eq!(decision["role"], "receptionist");

    let (_, logs) = get_json(&app, "/api/audit-logs?event_type=failed_access").await;
    assert_eq!(logs["pagination"]["total"], 1);
    assert_eq!(logs["entries"][0]["success"], false);
}

#[tokio::test]
async fn retention_evaluate_reports_decision() {
    let app = app();
    let (status, body) = get_json(
        &app,
        "/api/retention/evaluate?resource_type=system&created_at=2000-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "delete");
    assert_eq!(body["retention_period_days"], 365);

    let (status, body) = get_json(
        &app,
        "/api/retention/evaluate?resource_type=unknown_kind&created_at=2000-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn sweep_runs_on_demand() {
    let app = app();
    post_json(&app, "/api/audit-logs", lab_view("dr_lee")).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/retention/sweep")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["scanned"], 1);
    assert_eq!(report["retained"], 1);
}

#[tokio::test]
async fn entry_lookup_errors() {
    let app = app();
    let (status, body) = get_json(&app, "/api/audit-logs/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = get_json(
        &app,
        &format!("/api/audit-logs/{}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
