//! Read-time security analysis for single-entry detail views.
//!
//! Nothing here is stored. The analysis is recomputed on every fetch from the
//! entry itself, so it always reflects the current policy.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use phiguard_core::{AuditEventType, BusinessHours, RiskLevel};

use crate::event::AuditLogEntry;
use crate::storage::RecordState;

/// Notable properties of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityFlag {
    FailedOperation,
    OffHours,
    BulkAccess,
    DestructiveAction,
    DataExport,
    AutomatedClient,
    HighRisk,
}

impl SecurityFlag {
    fn weight(self) -> u32 {
        match self {
            Self::FailedOperation => 25,
            Self::OffHours => 10,
            Self::BulkAccess => 20,
            Self::DestructiveAction => 25,
            Self::DataExport => 15,
            Self::AutomatedClient => 10,
            Self::HighRisk => 20,
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Self::FailedOperation => {
                "Review recent failures for this principal for signs of credential misuse"
            }
            Self::OffHours => "Confirm the access was expected outside business hours",
            Self::BulkAccess => "Verify the business need for the volume of records accessed",
            Self::DestructiveAction => "Confirm the deletion was authorized and documented",
            Self::DataExport => "Check that exported data left through an approved channel",
            Self::AutomatedClient => "Ensure the automated client is registered and scoped",
            Self::HighRisk => "Escalate to the security officer for review",
        }
    }
}

/// Derived security view of one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub threat_level: RiskLevel,
    /// 0 to 100.
    pub anomaly_score: u8,
    pub flags: Vec<SecurityFlag>,
    pub recommendations: Vec<String>,
}

/// An entry with its lifecycle state, analysis and neighbours.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntryDetail {
    pub entry: AuditLogEntry,
    pub state: RecordState,
    pub security_analysis: SecurityAnalysis,
    pub related_events: Vec<AuditLogEntry>,
}

const AUTOMATED_AGENTS: &[&str] = &["bot", "curl", "wget", "python", "script", "postman"];

/// Analyze one entry.
pub fn analyze(entry: &AuditLogEntry, hours: &BusinessHours) -> SecurityAnalysis {
    let signals = entry.risk_signals();
    let action = entry.action.to_ascii_lowercase();
    let mut flags = Vec::new();

    if !entry.success {
        flags.push(SecurityFlag::FailedOperation);
    }
    if signals.contains(&"off_hours") || hours.is_off_hours(entry.timestamp.hour()) {
        flags.push(SecurityFlag::OffHours);
    }
    if signals.contains(&"bulk_access") {
        flags.push(SecurityFlag::BulkAccess);
    }
    if entry.event_type == AuditEventType::DataDeletion || matches!(action.as_str(), "delete" | "purge")
    {
        flags.push(SecurityFlag::DestructiveAction);
    }
    if matches!(
        entry.event_type,
        AuditEventType::ExportData | AuditEventType::PrintData
    ) || matches!(action.as_str(), "export" | "download" | "print")
    {
        flags.push(SecurityFlag::DataExport);
    }
    if let Some(agent) = &entry.user_agent {
        let agent = agent.to_ascii_lowercase();
        if AUTOMATED_AGENTS.iter().any(|a| agent.contains(a)) {
            flags.push(SecurityFlag::AutomatedClient);
        }
    }
    if entry.risk_level.requires_escalation() {
        flags.push(SecurityFlag::HighRisk);
    }

    let score: u32 = flags.iter().map(|f| f.weight()).sum();
    SecurityAnalysis {
        threat_level: entry.risk_level,
        anomaly_score: u8::try_from(score.min(100)).unwrap_or(100),
        recommendations: flags.iter().map(|f| f.recommendation().to_string()).collect(),
        flags,
    }
}
