//! Sample data for development deployments.
//!
//! Only used when `audit.seed_fixtures` is set, once at startup. Generated
//! entries carry `"fixture": true` in their details. The query path never
//! falls back to fixtures.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use phiguard_core::AuditEventType;

use crate::classification::ClassificationRegistry;
use crate::error::AuditError;
use crate::event::{
    AuditLogEntry, DETAIL_CACHE_HIT, DETAIL_CLASSIFICATION, DETAIL_DURATION_MS, DETAIL_ENDPOINT,
    DETAIL_METHOD, DETAIL_RISK_SIGNALS, DETAIL_SESSION_ID, RiskContext,
};
use crate::risk::{RiskClassifier, RiskInput};
use crate::storage::AuditStorage;

const USERS: &[&str] = &["dr_lee", "dr_patel", "nurse_joy", "lab_tech_kim", "admin", "svc_ingest"];
const RESOURCES: &[(&str, &str)] = &[
    ("lab_reports", "/api/lab-reports"),
    ("biomarkers", "/api/biomarkers"),
    ("health_alerts", "/api/health-alerts"),
    ("medical_records", "/api/records"),
    ("user_profiles", "/api/profile"),
    ("api", "/api/health"),
];
const AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4)",
    "curl/8.5.0",
];

/// Generate `count` entries spread over the 30 days before `now`.
pub fn generate(
    count: usize,
    classifier: &RiskClassifier,
    registry: &ClassificationRegistry,
    now: DateTime<Utc>,
) -> Vec<AuditLogEntry> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let event_type = AuditEventType::ALL
                .choose(&mut rng)
                .copied()
                .unwrap_or(AuditEventType::ApiRequest);
            let user = USERS.choose(&mut rng).copied().unwrap_or("admin");
            let (resource_type, endpoint) =
                RESOURCES.choose(&mut rng).copied().unwrap_or(("api", "/api"));
            let action = action_for(event_type, &mut rng);
            let success = rng.random_bool(0.9);
            let timestamp = now - Duration::seconds(rng.random_range(0..30 * 24 * 3600));
            let context = RiskContext {
                new_device: rng.random_bool(0.05),
                geo_anomaly: rng.random_bool(0.02),
                records_accessed: if rng.random_bool(0.03) { 500 } else { 1 },
                ..Default::default()
            };

            let assessment = classifier.assess(RiskInput {
                event_type,
                action,
                success,
                context: &context,
                at: timestamp,
            });

            let method = match action {
                "view" | "export" | "download" => "GET",
                "delete" => "DELETE",
                "update" => "PUT",
                _ => "POST",
            };
            let mut details = Map::new();
            details.insert(DETAIL_ENDPOINT.into(), Value::from(endpoint));
            details.insert(DETAIL_METHOD.into(), Value::from(method));
            details.insert(
                DETAIL_DURATION_MS.into(),
                Value::from(rng.random_range(5..1500_u32)),
            );
            details.insert(DETAIL_CACHE_HIT.into(), Value::from(rng.random_bool(0.4)));
            details.insert(
                DETAIL_SESSION_ID.into(),
                Value::from(format!("sess-{}-{}", user, rng.random_range(1..6_u32))),
            );
            details.insert(
                DETAIL_CLASSIFICATION.into(),
                Value::from(registry.classify_or_default(resource_type).level.as_str()),
            );
            details.insert(DETAIL_RISK_SIGNALS.into(), Value::from(assessment.signals));
            details.insert("fixture".into(), Value::Bool(true));

            AuditLogEntry {
                id: Uuid::new_v4(),
                timestamp,
                event_type,
                user_id: user.to_string(),
                patient_id: Some(format!("p-{:04}", rng.random_range(1..200_u32))),
                resource_type: resource_type.to_string(),
                resource_id: Some(format!("{}-{}", resource_type, rng.random_range(1..10_000_u32))),
                action: action.to_string(),
                ip_address: Some(format!(
                    "10.0.{}.{}",
                    rng.random_range(0..4_u8),
                    rng.random_range(2..250_u8)
                )),
                user_agent: AGENTS.choose(&mut rng).map(|a| a.to_string()),
                success,
                risk_level: assessment.level,
                details,
            }
        })
        .collect()
}

fn action_for(event_type: AuditEventType, rng: &mut impl Rng) -> &'static str {
    match event_type {
        AuditEventType::DataDeletion => "delete",
        AuditEventType::DataModification => {
            if rng.random_bool(0.5) { "update" } else { "create" }
        }
        AuditEventType::ExportData => "export",
        AuditEventType::PrintData => "print",
        AuditEventType::LabReportUpload => "upload",
        AuditEventType::LoginAttempt => "login",
        AuditEventType::Logout => "logout",
        AuditEventType::BiomarkerExtraction => "extract",
        AuditEventType::HealthAlertGenerated => "create",
        _ => "view",
    }
}

/// Generate and append fixtures. Returns the number written.
pub async fn seed_fixtures(
    storage: &Arc<dyn AuditStorage>,
    classifier: &RiskClassifier,
    registry: &ClassificationRegistry,
    count: usize,
    now: DateTime<Utc>,
) -> Result<usize, AuditError> {
    let entries = generate(count, classifier, registry, now);
    for entry in entries {
        storage.append(entry).await?;
    }
    tracing::warn!(count, "Seeded audit store with generated fixture entries");
    Ok(count)
}
