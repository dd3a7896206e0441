//! Risk classification.
//!
//! A pure function of the event type, the outcome, and the contextual signals.
//! Signal weights add up to a score which [`RiskThresholds`] maps onto a tier.
//! Two rules then raise the tier:
//!
//! - the event type's declared floor (e.g. `data_deletion` is never below `medium`);
//! - deletions and failed high-privilege actions sit at least one tier above a
//!   successful low-privilege read made in the same context.
//!
//! [`RiskThresholds`]: phiguard_core::RiskThresholds

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use phiguard_core::{AuditEventType, RiskLevel, RiskPolicyConfig};

use crate::event::RiskContext;

/// Result of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    /// Final tier.
    pub level: RiskLevel,
    /// Accumulated signal score.
    pub score: u32,
    /// Names of the signals that fired.
    pub signals: Vec<&'static str>,
}

/// Input to the classifier.
#[derive(Debug, Clone, Copy)]
pub struct RiskInput<'a> {
    pub event_type: AuditEventType,
    pub action: &'a str,
    pub success: bool,
    pub context: &'a RiskContext,
    pub at: DateTime<Utc>,
}

/// Classifies events into risk tiers under a configured policy.
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    policy: RiskPolicyConfig,
}

impl RiskClassifier {
    /// Create a classifier with the given policy.
    pub fn new(policy: RiskPolicyConfig) -> Self {
        Self { policy }
    }

    /// Classify an event, returning only the tier.
    pub fn classify(&self, input: RiskInput<'_>) -> RiskLevel {
        self.assess(input).level
    }

    /// Classify an event with the score and fired signals.
    pub fn assess(&self, input: RiskInput<'_>) -> RiskAssessment {
        let weights = &self.policy.weights;
        let mut signals = Vec::new();

        // Context signals: the part a plain successful read would also carry.
        let mut context_score: u32 = 0;
        let off_hours = input
            .context
            .off_hours
            .unwrap_or_else(|| self.policy.business_hours.is_off_hours(input.at.hour()));
        if off_hours {
            context_score = context_score.saturating_add(weights.off_hours);
            signals.push("off_hours");
        }
        if input.context.new_device {
            context_score = context_score.saturating_add(weights.new_device);
            signals.push("new_device");
        }
        if input.context.geo_anomaly {
            context_score = context_score.saturating_add(weights.geo_anomaly);
            signals.push("geo_anomaly");
        }
        if input.context.records_accessed >= self.policy.bulk_access_threshold {
            context_score = context_score.saturating_add(weights.bulk_access);
            signals.push("bulk_access");
        }

        let mut score = context_score;
        let action = input.action.to_ascii_lowercase();

        if !input.success {
            score = score.saturating_add(weights.failure);
            signals.push("failure");
        }
        let deletion = is_deletion(input.event_type, &action);
        if deletion {
            score = score.saturating_add(weights.deletion);
            signals.push("deletion");
        } else if is_modification(input.event_type, &action) {
            score = score.saturating_add(weights.modification);
            signals.push("modification");
        }
        if is_export(input.event_type, &action) {
            score = score.saturating_add(weights.export);
            signals.push("export");
        }
        if input.context.recent_failures >= self.policy.repeated_failure_threshold {
            score = score.saturating_add(weights.repeated_failures);
            signals.push("repeated_failures");
        }
        let failed_high_privilege = input.context.high_privilege && !input.success;
        if input.context.high_privilege {
            score = score.saturating_add(weights.high_privilege);
            signals.push("high_privilege");
        }
        if failed_high_privilege {
            score = score.saturating_add(weights.failed_high_privilege);
            signals.push("failed_high_privilege");
        }

        let mut level = self.policy.thresholds.tier_for(score);

        if deletion || failed_high_privilege {
            let read_level = self.policy.thresholds.tier_for(context_score);
            level = level.max(read_level.escalate());
        }

        level = level.max(self.policy.floor_for(input.event_type));

        RiskAssessment {
            level,
            score,
            signals,
        }
    }
}

fn is_deletion(event_type: AuditEventType, action: &str) -> bool {
    event_type == AuditEventType::DataDeletion || matches!(action, "delete" | "purge" | "destroy")
}

fn is_modification(event_type: AuditEventType, action: &str) -> bool {
    event_type == AuditEventType::DataModification
        || matches!(action, "create" | "update" | "upload" | "modify")
}

fn is_export(event_type: AuditEventType, action: &str) -> bool {
    matches!(
        event_type,
        AuditEventType::ExportData | AuditEventType::PrintData
    ) || matches!(action, "export" | "print" | "download")
}
