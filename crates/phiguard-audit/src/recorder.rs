//! Audit event recorder (the write path).
//!
//! `record` validates the raw event, assigns the server-side fields, scores
//! risk, scrubs PHI from `details` and makes exactly one append attempt.
//!
//! Availability of the audited operation takes precedence over audit
//! completeness. A failed append is not an error: it is reported back as a
//! warning, counted, and written with the full entry to the `phiguard::audit_fallback` log
//! target. Only validation errors are returned as `Err`.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use phiguard_core::PhiguardConfig;

use crate::classification::ClassificationRegistry;
use crate::details::scrub_details;
use crate::error::AuditError;
use crate::event::{AuditLogEntry, DETAIL_CLASSIFICATION, DETAIL_RISK_SIGNALS, RawEvent};
use crate::notifier::{EscalationNotifier, EscalationPayload};
use crate::risk::{RiskClassifier, RiskInput};
use crate::storage::AuditStorage;

/// Log target for entries that could not be persisted.
pub const FALLBACK_TARGET: &str = "phiguard::audit_fallback";

/// Resource type recorded when the producer gives none.
pub const UNSPECIFIED_RESOURCE: &str = "unspecified";

/// Non-fatal conditions raised while recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RecordWarning {
    /// The resource type is not registered; the default classification was used.
    UnknownResourceType(String),
    /// The store rejected the write; the entry went to the fallback log.
    PersistenceFailure(String),
    /// The producer supplied a server-assigned field, which was ignored.
    IgnoredClientField(&'static str),
    /// Recording is disabled in configuration.
    RecordingDisabled,
}

impl fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownResourceType(t) => {
                write!(f, "unknown resource type '{}', default classification applied", t)
            }
            Self::PersistenceFailure(e) => write!(f, "audit entry not persisted: {}", e),
            Self::IgnoredClientField(name) => write!(f, "client-supplied '{}' ignored", name),
            Self::RecordingDisabled => f.write_str("audit recording is disabled"),
        }
    }
}

/// Outcome of one `record` call.
#[derive(Debug, Clone, Serialize)]
pub struct RecordResult {
    pub entry: AuditLogEntry,
    /// Whether the store accepted the entry.
    pub persisted: bool,
    /// Whether an escalation was dispatched.
    pub escalated: bool,
    pub warnings: Vec<RecordWarning>,
}

/// The audit write path.
pub struct AuditRecorder {
    storage: Arc<dyn AuditStorage>,
    registry: Arc<ClassificationRegistry>,
    classifier: RiskClassifier,
    notifier: Arc<dyn EscalationNotifier>,
    phi_keys: Vec<String>,
    enabled: bool,
    persistence_failures: AtomicU64,
    escalation_failures: Arc<AtomicU64>,
}

impl AuditRecorder {
    pub fn new(
        storage: Arc<dyn AuditStorage>,
        registry: Arc<ClassificationRegistry>,
        classifier: RiskClassifier,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Self {
        Self {
            storage,
            registry,
            classifier,
            notifier,
            phi_keys: Vec::new(),
            enabled: true,
            persistence_failures: AtomicU64::new(0),
            escalation_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build a recorder with the PHI keys and switches from configuration.
    pub fn from_config(
        config: &PhiguardConfig,
        storage: Arc<dyn AuditStorage>,
        registry: Arc<ClassificationRegistry>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Self {
        Self::new(
            storage,
            registry,
            RiskClassifier::new(config.risk.clone()),
            notifier,
        )
        .with_phi_keys(config.audit.phi_detail_keys.clone())
        .with_enabled(config.audit.enabled)
    }

    pub fn with_phi_keys(mut self, keys: Vec<String>) -> Self {
        self.phi_keys = keys;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Appends that failed since startup.
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    /// Escalations that failed since startup.
    pub fn escalation_failures(&self) -> u64 {
        self.escalation_failures.load(Ordering::Relaxed)
    }

    /// Record one event.
    pub async fn record(&self, raw: RawEvent) -> Result<RecordResult, AuditError> {
        let event_type = validate(&raw)?;
        let mut warnings = Vec::new();

        for field in raw.client_assigned_fields() {
            tracing::debug!(field, "Ignoring client-supplied server field");
            warnings.push(RecordWarning::IgnoredClientField(field));
        }

        let resource_type = raw
            .resource_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNSPECIFIED_RESOURCE)
            .to_string();

        let classification = match self.registry.classify(&resource_type) {
            Ok(classification) => classification,
            Err(e) => {
                if resource_type != UNSPECIFIED_RESOURCE {
                    tracing::warn!(resource_type = %resource_type, "{}", e);
                    warnings.push(RecordWarning::UnknownResourceType(resource_type.clone()));
                }
                self.registry.fallback()
            }
        };

        let timestamp = Utc::now();
        let assessment = self.classifier.assess(RiskInput {
            event_type,
            action: raw.action.trim(),
            success: raw.success,
            context: &raw.context,
            at: timestamp,
        });

        let mut details = raw.details;
        let scrubbed = scrub_details(&mut details, &self.phi_keys);
        if scrubbed > 0 {
            tracing::debug!(count = scrubbed, "Hashed PHI values in audit details");
        }
        details.insert(
            DETAIL_CLASSIFICATION.to_string(),
            Value::from(classification.level.as_str()),
        );
        details.insert(
            DETAIL_RISK_SIGNALS.to_string(),
            Value::from(assessment.signals.clone()),
        );

        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp,
            event_type,
            user_id: raw.user_id.trim().to_string(),
            patient_id: raw.patient_id,
            resource_type,
            resource_id: raw.resource_id,
            action: raw.action.trim().to_string(),
            ip_address: raw.ip_address,
            user_agent: raw.user_agent,
            success: raw.success,
            risk_level: assessment.level,
            details,
        };

        if !self.enabled {
            warnings.push(RecordWarning::RecordingDisabled);
            return Ok(RecordResult {
                entry,
                persisted: false,
                escalated: false,
                warnings,
            });
        }

        let persisted = match self.storage.append(entry.clone()).await {
            Ok(()) => {
                tracing::debug!(
                    event_id = %entry.id,
                    event_type = %entry.event_type,
                    risk_level = %entry.risk_level,
                    user_id = %entry.user_id,
                    "Audit entry recorded"
                );
                true
            }
            Err(e) => {
                self.persistence_failures.fetch_add(1, Ordering::Relaxed);
                let serialized = serde_json::to_string(&entry)
                    .unwrap_or_else(|_| entry.to_log_line());
                tracing::error!(
                    target: FALLBACK_TARGET,
                    event_id = %entry.id,
                    error = %e,
                    entry = %serialized,
                    "Audit entry could not be persisted"
                );
                warnings.push(RecordWarning::PersistenceFailure(e.to_string()));
                false
            }
        };

        let escalated = entry.risk_level.requires_escalation();
        if escalated {
            self.escalate(entry.clone());
        }

        Ok(RecordResult {
            entry,
            persisted,
            escalated,
            warnings,
        })
    }

    fn escalate(&self, entry: AuditLogEntry) {
        let notifier = Arc::clone(&self.notifier);
        let failures = Arc::clone(&self.escalation_failures);
        tokio::spawn(async move {
            let payload = EscalationPayload::new(entry);
            if let Err(e) = notifier.notify(&payload).await {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event_id = %payload.entry.id, "Escalation failed: {}", e);
            }
        });
    }
}

fn validate(raw: &RawEvent) -> Result<phiguard_core::AuditEventType, AuditError> {
    let mut missing = Vec::new();
    if raw.event_type.is_none() {
        missing.push("event_type");
    }
    if raw.user_id.trim().is_empty() {
        missing.push("user_id");
    }
    if raw.action.trim().is_empty() {
        missing.push("action");
    }
    match raw.event_type {
        Some(event_type) if missing.is_empty() => Ok(event_type),
        _ => Err(AuditError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RiskContext;
    use crate::storage::MemoryStorage;
    use crate::test_support::{FailingStorage, RecordingNotifier};
    use phiguard_core::{AuditEventType, RiskLevel};
    use serde_json::json;

    fn recorder(
        storage: Arc<dyn AuditStorage>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> AuditRecorder {
        AuditRecorder::from_config(
            &PhiguardConfig::default(),
            storage,
            Arc::new(ClassificationRegistry::from_config(&PhiguardConfig::default())),
            notifier,
        )
    }

    #[tokio::test]
    async fn rejects_missing_required_fields() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = recorder(storage.clone(), Arc::new(RecordingNotifier::default()));
        let err = rec.record(RawEvent::default()).await.unwrap_err();
        match err {
            AuditError::Validation(msg) => {
                assert!(msg.contains("event_type"));
                assert!(msg.contains("user_id"));
                assert!(msg.contains("action"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assigns_server_fields_and_ignores_client_ones() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = recorder(storage.clone(), Arc::new(RecordingNotifier::default()));
        let raw: RawEvent = serde_json::from_value(json!({
            "event_type": "data_access",
            "user_id": "dr_lee",
            "action": "view",
            "resource_type": "lab_reports",
            "id": "00000000-0000-0000-0000-000000000001",
            "timestamp": "2001-01-01T00:00:00Z",
            "risk_level": "critical",
            "context": { "off_hours": false }
        }))
        .unwrap();

        let before = Utc::now();
        let result = rec.record(raw).await.unwrap();
        let after = Utc::now();

        assert!(result.persisted);
        assert_eq!(result.entry.risk_level, RiskLevel::Low);
        assert!(result.entry.timestamp >= before && result.entry.timestamp <= after);
        assert_ne!(result.entry.id.to_string(), "00000000-0000-0000-0000-000000000001");
        assert!(result
            .warnings
            .contains(&RecordWarning::IgnoredClientField("risk_level")));
        assert!(storage.get(result.entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_resource_type_is_recorded_with_warning() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = recorder(storage.clone(), Arc::new(RecordingNotifier::default()));
        let raw = RawEvent::builder(AuditEventType::DataAccess, "u", "view")
            .resource_type("spaceships")
            .build();
        let result = rec.record(raw).await.unwrap();
        assert!(result.persisted);
        assert_eq!(
            result.warnings,
            vec![RecordWarning::UnknownResourceType("spaceships".into())]
        );
        assert_eq!(
            result.entry.details[DETAIL_CLASSIFICATION],
            json!("confidential")
        );
    }

    #[tokio::test]
    async fn persistence_failure_is_degraded_not_fatal() {
        let rec = recorder(Arc::new(FailingStorage), Arc::new(RecordingNotifier::default()));
        let raw = RawEvent::builder(AuditEventType::LabReportUpload, "u", "upload")
            .resource("lab_reports", "lr-1")
            .build();
        let result = rec.record(raw).await.unwrap();
        assert!(!result.persisted);
        assert!(matches!(
            result.warnings.last(),
            Some(RecordWarning::PersistenceFailure(_))
        ));
        assert_eq!(rec.persistence_failures(), 1);
    }

    #[tokio::test]
    async fn high_risk_is_escalated_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let rec = recorder(Arc::new(MemoryStorage::new()), notifier.clone());
        let raw = RawEvent::builder(AuditEventType::SecurityEvent, "u", "detect").build();
        let result = rec.record(raw).await.unwrap();
        assert!(result.escalated);

        notifier.wait_for(1).await;
        let seen = notifier.payloads();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].entry.id, result.entry.id);
    }

    #[tokio::test]
    async fn escalation_failure_does_not_fail_record() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let rec = recorder(Arc::new(MemoryStorage::new()), notifier.clone());
        let raw = RawEvent::builder(AuditEventType::SecurityEvent, "u", "detect").build();
        let result = rec.record(raw).await.unwrap();
        assert!(result.persisted);
        notifier.wait_for(1).await;
        for _ in 0..100 {
            if rec.escalation_failures() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(rec.escalation_failures(), 1);
    }

    #[tokio::test]
    async fn phi_values_are_hashed_and_signals_recorded() {
        let rec = recorder(
            Arc::new(MemoryStorage::new()),
            Arc::new(RecordingNotifier::default()),
        );
        let raw = RawEvent::builder(AuditEventType::DataAccess, "u", "view")
            .resource_type("biomarkers")
            .detail("patient_name", "Jane Doe")
            .detail("endpoint", "/api/biomarkers")
            .context(RiskContext {
                off_hours: Some(true),
                ..Default::default()
            })
            .build();
        let result = rec.record(raw).await.unwrap();
        let name = result.entry.details["patient_name"].as_str().unwrap();
        assert!(name.starts_with("sha256:"));
        assert_eq!(result.entry.endpoint(), Some("/api/biomarkers"));
        assert_eq!(result.entry.risk_signals(), vec!["off_hours"]);
    }

    #[tokio::test]
    async fn disabled_recording_skips_the_store() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = recorder(storage.clone(), Arc::new(RecordingNotifier::default()))
            .with_enabled(false);
        let raw = RawEvent::builder(AuditEventType::DataAccess, "u", "view").build();
        let result = rec.record(raw).await.unwrap();
        assert!(!result.persisted);
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
