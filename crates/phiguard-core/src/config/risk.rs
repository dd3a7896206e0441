//! Risk classification policy.
//!
//! The classifier adds up signal weights into a score and maps the score onto
//! a tier using [`RiskThresholds`]. Per-event-type floors then raise the tier
//! to a declared minimum. Configured floors are merged over the defaults, and
//! deletions and failed accesses never fall below `medium`. All numbers live here so tier boundaries can be
//! tuned without touching the engine.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::{AuditEventType, RiskLevel};

/// Risk classification policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicyConfig {
    /// Score boundaries between tiers.
    #[serde(default)]
    pub thresholds: RiskThresholds,

    /// Weight of each risk signal.
    #[serde(default)]
    pub weights: RiskWeights,

    /// Recent failure count at which the repeated-failure signal fires.
    #[serde(default = "default_repeated_failure_threshold")]
    pub repeated_failure_threshold: u32,

    /// Records touched by one event at which the bulk-access signal fires.
    #[serde(default = "default_bulk_access_threshold")]
    pub bulk_access_threshold: u64,

    /// Business hours used to derive off-hours access when producers don't say.
    #[serde(default)]
    pub business_hours: BusinessHours,

    /// Minimum tier per event type, layered over [`default_floors`].
    #[serde(default = "default_floors", deserialize_with = "merge_floors")]
    pub floors: HashMap<AuditEventType, RiskLevel>,
}

/// Minimum score for each tier above `low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskThresholds {
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 20,
            high: 50,
            critical: 80,
        }
    }
}

impl RiskThresholds {
    /// Map a score onto a tier.
    pub fn tier_for(&self, score: u32) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Score contributed by each signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub failure: u32,
    pub deletion: u32,
    pub modification: u32,
    pub export: u32,
    pub off_hours: u32,
    pub new_device: u32,
    pub geo_anomaly: u32,
    pub repeated_failures: u32,
    pub bulk_access: u32,
    pub high_privilege: u32,
    pub failed_high_privilege: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            failure: 15,
            deletion: 25,
            modification: 10,
            export: 15,
            off_hours: 10,
            new_device: 10,
            geo_anomaly: 25,
            repeated_failures: 30,
            bulk_access: 25,
            high_privilege: 10,
            failed_high_privilege: 20,
        }
    }
}

/// UTC hours `[start, end)` counted as business hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 19,
        }
    }
}

impl BusinessHours {
    /// Whether the given UTC hour falls outside business hours.
    pub fn is_off_hours(&self, hour: u32) -> bool {
        hour < self.start_hour || hour >= self.end_hour
    }
}

impl Default for RiskPolicyConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            weights: RiskWeights::default(),
            repeated_failure_threshold: default_repeated_failure_threshold(),
            bulk_access_threshold: default_bulk_access_threshold(),
            business_hours: BusinessHours::default(),
            floors: default_floors(),
        }
    }
}

impl RiskPolicyConfig {
    /// Declared minimum tier for an event type, never below its mandatory floor.
    pub fn floor_for(&self, event_type: AuditEventType) -> RiskLevel {
        let configured = self
            .floors
            .get(&event_type)
            .copied()
            .unwrap_or(RiskLevel::Low);
        configured.max(mandatory_floor(event_type))
    }
}

/// Floors that configuration may raise but never lower.
pub const MANDATORY_FLOORS: [(AuditEventType, RiskLevel); 2] = [
    (AuditEventType::DataDeletion, RiskLevel::Medium),
    (AuditEventType::FailedAccess, RiskLevel::Medium),
];

/// Mandatory minimum tier for an event type.
pub fn mandatory_floor(event_type: AuditEventType) -> RiskLevel {
    MANDATORY_FLOORS
        .iter()
        .find(|(t, _)| *t == event_type)
        .map(|(_, level)| *level)
        .unwrap_or(RiskLevel::Low)
}

fn default_repeated_failure_threshold() -> u32 {
    3
}

fn default_bulk_access_threshold() -> u64 {
    100
}

/// Floors applied when the configuration names none.
pub fn default_floors() -> HashMap<AuditEventType, RiskLevel> {
    HashMap::from([
        (AuditEventType::DataDeletion, RiskLevel::Medium),
        (AuditEventType::FailedAccess, RiskLevel::Medium),
        (AuditEventType::ExportData, RiskLevel::Medium),
        (AuditEventType::PrintData, RiskLevel::Medium),
        (AuditEventType::LabReportUpload, RiskLevel::Medium),
        (AuditEventType::SecurityEvent, RiskLevel::High),
    ])
}

fn merge_floors<'de, D>(deserializer: D) -> Result<HashMap<AuditEventType, RiskLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let configured = HashMap::<AuditEventType, RiskLevel>::deserialize(deserializer)?;
    let mut floors = default_floors();
    floors.extend(configured);
    Ok(floors)
}
