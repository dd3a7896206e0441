use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Configuration types shared across all phiguard crates
pub mod config;

pub use config::{
    AccessConfig, AuditConfig, BusinessHours, ConfigError, DashboardConfig, DataClassification,
    EscalationConfig, PhiguardConfig, QueryConfig, RetentionConfig, RiskPolicyConfig,
    RiskThresholds, RiskWeights, StorageBackend, StorageConfig,
};

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    DataAccess,
    DataModification,
    DataDeletion,
    LoginAttempt,
    Logout,
    FailedAccess,
    ExportData,
    PrintData,
    BiomarkerExtraction,
    LabReportUpload,
    HealthAlertGenerated,
    SecurityEvent,
    ApiRequest,
    SystemAccess,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 14] = [
        Self::DataAccess,
        Self::DataModification,
        Self::DataDeletion,
        Self::LoginAttempt,
        Self::Logout,
        Self::FailedAccess,
        Self::ExportData,
        Self::PrintData,
        Self::BiomarkerExtraction,
        Self::LabReportUpload,
        Self::HealthAlertGenerated,
        Self::SecurityEvent,
        Self::ApiRequest,
        Self::SystemAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataAccess => "data_access",
            Self::DataModification => "data_modification",
            Self::DataDeletion => "data_deletion",
            Self::LoginAttempt => "login_attempt",
            Self::Logout => "logout",
            Self::FailedAccess => "failed_access",
            Self::ExportData => "export_data",
            Self::PrintData => "print_data",
            Self::BiomarkerExtraction => "biomarker_extraction",
            Self::LabReportUpload => "lab_report_upload",
            Self::HealthAlertGenerated => "health_alert_generated",
            Self::SecurityEvent => "security_event",
            Self::ApiRequest => "api_request",
            Self::SystemAccess => "system_access",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("event type", s))
    }
}

/// Risk tier of an audit entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// The next tier up; `Critical` saturates.
    pub fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    /// Whether entries at this tier are sent to the escalation channel.
    pub fn requires_escalation(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("risk level", s))
    }
}

/// Sensitivity of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_its_own_name() {
        for t in AuditEventType::ALL {
            assert_eq!(t.as_str().parse::<AuditEventType>().unwrap(), t);
        }
        assert!("nope".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuditEventType::LabReportUpload).unwrap();
        assert_eq!(json, "\"lab_report_upload\"");
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::Medium);
        assert_eq!(RiskLevel::Critical.escalate(), RiskLevel::Critical);
        assert!(RiskLevel::High.requires_escalation());
        assert!(!RiskLevel::Medium.requires_escalation());
    }
}
