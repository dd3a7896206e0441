//! Escalation channel for high-risk entries.
//!
//! Notification is fire-and-forget: the recorder spawns it after the write
//! and only logs failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use phiguard_core::EscalationConfig;

use crate::error::AuditError;
use crate::event::AuditLogEntry;

/// Body delivered to the escalation sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPayload {
    pub entry: AuditLogEntry,
    pub triggered_at: DateTime<Utc>,
}

impl EscalationPayload {
    pub fn new(entry: AuditLogEntry) -> Self {
        Self {
            entry,
            triggered_at: Utc::now(),
        }
    }
}

/// Sink for high-risk entries. No response contract beyond success or failure.
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), AuditError>;
}

/// Posts payloads as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::EscalationFailed(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EscalationNotifier for WebhookNotifier {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), AuditError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AuditError::EscalationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::EscalationFailed(format!(
                "webhook returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Writes escalations to the process log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl EscalationNotifier for LogNotifier {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), AuditError> {
        tracing::warn!(
            event_id = %payload.entry.id,
            event_type = %payload.entry.event_type,
            risk_level = %payload.entry.risk_level,
            user_id = %payload.entry.user_id,
            "High-risk audit event: {}",
            payload.entry.to_log_line()
        );
        Ok(())
    }
}

/// Discards escalations.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl EscalationNotifier for NoopNotifier {
    async fn notify(&self, _payload: &EscalationPayload) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Build the notifier described by configuration.
pub fn create_notifier(config: &EscalationConfig) -> Result<Arc<dyn EscalationNotifier>, AuditError> {
    if !config.enabled {
        return Ok(Arc::new(NoopNotifier));
    }
    match config.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url,
            Duration::from_millis(config.timeout_ms),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;
    use phiguard_core::AuditEventType;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn webhook_error_status_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\n\r\n")
                    .await;
            }
        });

        let notifier =
            WebhookNotifier::new(format!("http://{}/hook", addr), Duration::from_secs(2)).unwrap();
        let payload = EscalationPayload::new(entry(AuditEventType::SecurityEvent, "u"));
        let err = notifier.notify(&payload).await.unwrap_err();
        assert!(matches!(err, AuditError::EscalationFailed(_)));
    }

    #[tokio::test]
    async fn disabled_escalation_is_noop() {
        let config = EscalationConfig {
            enabled: false,
            webhook_url: Some("http://127.0.0.1:9/never".into()),
            ..Default::default()
        };
        let notifier = create_notifier(&config).unwrap();
        let payload = EscalationPayload::new(entry(AuditEventType::SecurityEvent, "u"));
        notifier.notify(&payload).await.unwrap();
    }
}
