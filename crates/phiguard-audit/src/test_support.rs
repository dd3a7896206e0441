//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Map;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use phiguard_core::{AuditEventType, RiskLevel};

use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::notifier::{EscalationNotifier, EscalationPayload};
use crate::query::ResolvedFilter;
use crate::storage::{AuditStorage, RecordState, StoredEntry};

pub fn entry(event_type: AuditEventType, user_id: &str) -> AuditLogEntry {
    AuditLogEntry {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        event_type,
        user_id: user_id.to_string(),
        patient_id: None,
        resource_type: "api".to_string(),
        resource_id: None,
        action: "view".to_string(),
        ip_address: None,
        user_agent: None,
        success: true,
        risk_level: RiskLevel::Low,
        details: Map::new(),
    }
}

/// A store that rejects everything.
pub struct FailingStorage;

fn unreachable_store() -> AuditError {
    AuditError::PersistenceFailure("store unreachable".to_string())
}

#[async_trait]
impl AuditStorage for FailingStorage {
    async fn append(&self, _entry: AuditLogEntry) -> Result<(), AuditError> {
        Err(unreachable_store())
    }
    async fn get(&self, _id: Uuid) -> Result<Option<StoredEntry>, AuditError> {
        Err(unreachable_store())
    }
    async fn find(&self, _filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        Err(unreachable_store())
    }
    async fn scan(&self, _after: Option<Uuid>, _limit: usize) -> Result<Vec<StoredEntry>, AuditError> {
        Err(unreachable_store())
    }
    async fn transition(
        &self,
        _id: Uuid,
        _expected: RecordState,
        _next: RecordState,
    ) -> Result<bool, AuditError> {
        Err(unreachable_store())
    }
    async fn count(&self) -> Result<usize, AuditError> {
        Err(unreachable_store())
    }
}

/// Notifier that keeps every payload it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    payloads: Mutex<Vec<EscalationPayload>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn payloads(&self) -> Vec<EscalationPayload> {
        self.payloads.lock().unwrap().clone()
    }

    /// Wait until at least `n` payloads arrived.
    pub async fn wait_for(&self, n: usize) {
        let wait = async {
            while self.payloads.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("notifier was not called");
    }
}

#[async_trait]
impl EscalationNotifier for RecordingNotifier {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), AuditError> {
        self.payloads.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(AuditError::EscalationFailed("sink offline".to_string()));
        }
        Ok(())
    }
}
