//! Audit event types.
//!
//! [`RawEvent`] is what producers hand to the recorder. [`AuditLogEntry`] is
//! what the recorder persists: it carries a server-assigned id, timestamp and
//! risk level, and is never updated once written. Corrections are new entries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use phiguard_core::{AuditEventType, RiskLevel};

/// Details key holding the endpoint of an API request.
pub const DETAIL_ENDPOINT: &str = "endpoint";
/// Details key holding the request duration in milliseconds.
pub const DETAIL_DURATION_MS: &str = "duration_ms";
/// Details key holding whether the response came from cache.
pub const DETAIL_CACHE_HIT: &str = "cache_hit";
/// Details key holding the HTTP method.
pub const DETAIL_METHOD: &str = "method";
/// Details key holding the session identifier.
pub const DETAIL_SESSION_ID: &str = "session_id";
/// Details key holding the risk signals that fired at record time.
pub const DETAIL_RISK_SIGNALS: &str = "risk_signals";
/// Details key holding the sensitivity level of the resource type.
pub const DETAIL_CLASSIFICATION: &str = "data_classification";

/// A persisted audit entry.
///
/// `details` holds references and hashes only, never raw PHI values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry ID, assigned at write time.
    pub id: Uuid,

    /// When the event occurred (UTC), assigned by the recorder.
    pub timestamp: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Principal responsible for the action (may be a system identity).
    pub user_id: String,

    /// Patient the event concerns, as a reference ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    /// Resource type acted upon.
    pub resource_type: String,

    /// Resource acted upon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Verb (view, create, update, delete, export, upload...).
    pub action: String,

    /// Client IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Outcome of the action.
    pub success: bool,

    /// Computed risk tier.
    pub risk_level: RiskLevel,

    /// Open attribute map (duration, size, endpoint, response code, session...).
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl AuditLogEntry {
    /// Request duration in milliseconds, if recorded.
    pub fn duration_ms(&self) -> Option<f64> {
        self.details.get(DETAIL_DURATION_MS).and_then(Value::as_f64)
    }

    /// Whether the response was served from cache, if recorded.
    pub fn cache_hit(&self) -> Option<bool> {
        self.details.get(DETAIL_CACHE_HIT).and_then(Value::as_bool)
    }

    /// HTTP method, if recorded.
    pub fn http_method(&self) -> Option<&str> {
        self.details
            .get(DETAIL_METHOD)
            .or_else(|| self.details.get("http_method"))
            .and_then(Value::as_str)
    }

    /// Endpoint, if recorded.
    pub fn endpoint(&self) -> Option<&str> {
        self.details.get(DETAIL_ENDPOINT).and_then(Value::as_str)
    }

    /// Session identifier, if recorded.
    pub fn session_id(&self) -> Option<&str> {
        self.details.get(DETAIL_SESSION_ID).and_then(Value::as_str)
    }

    /// Risk signals that fired when the entry was classified.
    pub fn risk_signals(&self) -> Vec<&str> {
        self.details
            .get(DETAIL_RISK_SIGNALS)
            .and_then(Value::as_array)
            .map(|signals| signals.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Format the entry as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE user=... resource=... action=... risk=...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} user={} resource={} action={} success={} risk={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.event_type.as_str().to_uppercase(),
            self.user_id,
            self.resource_type,
            self.action,
            self.success,
            self.risk_level,
        );

        if let Some(ref resource_id) = self.resource_id {
            line.push_str(&format!(" resource_id={}", resource_id));
        }
        if let Some(ref ip) = self.ip_address {
            line.push_str(&format!(" ip={}", ip));
        }
        if let Some(duration) = self.duration_ms() {
            line.push_str(&format!(" duration_ms={}", duration));
        }

        line
    }
}

/// Contextual risk signals supplied by the producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskContext {
    /// Whether the access happened outside business hours.
    /// Derived from the event time when not supplied.
    pub off_hours: Option<bool>,
    /// Request came from a device not seen before for this principal.
    pub new_device: bool,
    /// Request origin is unusual for this principal.
    pub geo_anomaly: bool,
    /// Failed attempts by this principal in the recent window.
    pub recent_failures: u32,
    /// Number of records touched by this event.
    pub records_accessed: u64,
    /// The action needs elevated privileges.
    pub high_privilege: bool,
}

/// Event as submitted by a producer.
///
/// `id`, `timestamp` and `risk_level` are accepted on the wire so that
/// producers echoing stored entries don't fail to parse, but they are never
/// used: the recorder assigns all three.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_type: Option<AuditEventType>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub context: RiskContext,

    /// Ignored; assigned server-side.
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Value>,
    /// Ignored; assigned server-side.
    #[serde(default, rename = "timestamp", skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<Value>,
    /// Ignored; computed server-side.
    #[serde(default, rename = "risk_level", skip_serializing_if = "Option::is_none")]
    pub client_risk_level: Option<Value>,
}

fn default_success() -> bool {
    true
}

impl RawEvent {
    /// Create a builder with the required fields.
    pub fn builder(
        event_type: AuditEventType,
        user_id: impl Into<String>,
        action: impl Into<String>,
    ) -> RawEventBuilder {
        RawEventBuilder::new(event_type, user_id, action)
    }

    /// Names of server-assigned fields the producer tried to set.
    pub fn client_assigned_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.client_id.is_some() {
            fields.push("id");
        }
        if self.client_timestamp.is_some() {
            fields.push("timestamp");
        }
        if self.client_risk_level.is_some() {
            fields.push("risk_level");
        }
        fields
    }
}

/// Builder for raw events.
#[derive(Debug)]
pub struct RawEventBuilder {
    event: RawEvent,
}

impl RawEventBuilder {
    /// Create a new builder with required fields.
    pub fn new(
        event_type: AuditEventType,
        user_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            event: RawEvent {
                event_type: Some(event_type),
                user_id: user_id.into(),
                action: action.into(),
                success: true,
                ..Default::default()
            },
        }
    }

    /// Set the resource type and ID.
    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.event.resource_type = Some(resource_type.into());
        self.event.resource_id = Some(resource_id.into());
        self
    }

    /// Set the resource type only.
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.event.resource_type = Some(resource_type.into());
        self
    }

    /// Set the patient reference.
    pub fn patient(mut self, patient_id: impl Into<String>) -> Self {
        self.event.patient_id = Some(patient_id.into());
        self
    }

    /// Set the client IP.
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.event.ip_address = Some(ip.into());
        self
    }

    /// Set the client user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.event.user_agent = Some(agent.into());
        self
    }

    /// Set the outcome.
    pub fn success(mut self, success: bool) -> Self {
        self.event.success = success;
        self
    }

    /// Add one details attribute.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.details.insert(key.into(), value.into());
        self
    }

    /// Set the risk context.
    pub fn context(mut self, context: RiskContext) -> Self {
        self.event.context = context;
        self
    }

    /// Build the raw event.
    pub fn build(self) -> RawEvent {
        self.event
    }
}
