//! API request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use phiguard_audit::{
    AuditEventType, AuditFilter, ExportFormat, PageRequest, RecordResult, RiskLevel, SortField,
    SortOrder, TimeRange,
};

// =============================================================================
// Audit Log Query Types
// =============================================================================

/// Query string of `GET /api/audit-logs` and its export.
///
/// Kept flat because the urlencoded deserializer can't parse numbers or
/// booleans through `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditLogQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    #[serde(alias = "resourceType")]
    pub resource_type: Option<String>,
    #[serde(alias = "eventType")]
    pub event_type: Option<AuditEventType>,
    pub action: Option<String>,
    pub success: Option<bool>,
    #[serde(alias = "riskLevel")]
    pub risk_level: Option<RiskLevel>,
    #[serde(alias = "ipAddress")]
    pub ip_address: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(alias = "timeRange")]
    pub time_range: Option<TimeRange>,
    pub search: Option<String>,
    #[serde(alias = "httpMethod")]
    pub http_method: Option<String>,
    #[serde(alias = "minDuration")]
    pub min_duration: Option<f64>,
    #[serde(alias = "maxDuration")]
    pub max_duration: Option<f64>,
    #[serde(alias = "cacheHit")]
    pub cache_hit: Option<bool>,

    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<SortField>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<SortOrder>,

    /// Export only.
    pub format: Option<ExportFormat>,
}

impl AuditLogQuery {
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            user_id: self.user_id.clone(),
            resource_type: self.resource_type.clone(),
            event_type: self.event_type,
            action: self.action.clone(),
            success: self.success,
            risk_level: self.risk_level,
            ip_address: self.ip_address.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            time_range: self.time_range,
            search: self.search.clone(),
            http_method: self.http_method.clone(),
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            cache_hit: self.cache_hit,
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), self.limit.unwrap_or(0)).sorted(
            self.sort_by.unwrap_or_default(),
            self.sort_order.unwrap_or_default(),
        )
    }
}

// =============================================================================
// Recording Types
// =============================================================================

/// Response to `POST /api/audit-logs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub persisted: bool,
    pub escalated: bool,
    pub warnings: Vec<String>,
}

impl From<RecordResult> for RecordResponse {
    fn from(result: RecordResult) -> Self {
        Self {
            id: result.entry.id,
            timestamp: result.entry.timestamp,
            risk_level: result.entry.risk_level,
            persisted: result.persisted,
            escalated: result.escalated,
            warnings: result.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }
}

// =============================================================================
// Retention Types
// =============================================================================

/// Query string of `GET /api/retention/evaluate`.
#[derive(Debug, Deserialize)]
pub struct RetentionEvaluateQuery {
    pub resource_type: String,
    /// RFC 3339 creation time.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Health Types
// =============================================================================

/// Response to `GET /healthz`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// `None` when the store could not be reached.
    pub stored_entries: Option<usize>,
    pub persistence_failures: u64,
    pub escalation_failures: u64,
}
