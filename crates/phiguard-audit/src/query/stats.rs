//! Aggregate statistics over a filtered result set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use phiguard_core::RiskLevel;

use crate::event::AuditLogEntry;

/// Entry count per risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskDistribution {
    fn add(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }
}

/// Statistics over the filtered set, before pagination.
///
/// Rates are percentages. Every rate and average is `0` for an empty set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub total_events: usize,
    pub unique_users: usize,
    pub failed_events: usize,
    pub success_rate: f64,
    /// Mean `duration_ms` over entries that recorded one.
    pub avg_response_time: f64,
    /// Share of cache hits among entries that recorded a cache outcome.
    pub cache_hit_rate: f64,
    pub risk_distribution: RiskDistribution,
}

impl QueryStatistics {
    pub fn compute(entries: &[AuditLogEntry]) -> Self {
        let mut risk_distribution = RiskDistribution::default();
        let mut users = HashSet::new();
        let mut successes = 0usize;
        let mut duration_sum = 0.0;
        let mut duration_count = 0usize;
        let mut cache_hits = 0usize;
        let mut cache_known = 0usize;

        for entry in entries {
            risk_distribution.add(entry.risk_level);
            users.insert(entry.user_id.as_str());
            if entry.success {
                successes += 1;
            }
            if let Some(duration) = entry.duration_ms().filter(|d| d.is_finite()) {
                duration_sum += duration;
                duration_count += 1;
            }
            if let Some(hit) = entry.cache_hit() {
                cache_known += 1;
                if hit {
                    cache_hits += 1;
                }
            }
        }

        Self {
            total_events: entries.len(),
            unique_users: users.len(),
            failed_events: entries.len() - successes,
            success_rate: percentage(successes, entries.len()),
            avg_response_time: round2(ratio(duration_sum, duration_count)),
            cache_hit_rate: percentage(cache_hits, cache_known),
            risk_distribution,
        }
    }
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn percentage(part: usize, whole: usize) -> f64 {
    round2(ratio(part as f64 * 100.0, whole))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;
    use phiguard_core::AuditEventType;
    use serde_json::json;

    #[test]
    fn empty_set_yields_zeros() {
        let stats = QueryStatistics::compute(&[]);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_response_time, 0.0);
        assert_eq!(stats.cache_hit_rate, 0.0);
        assert!(!stats.success_rate.is_nan());
        assert_eq!(stats.risk_distribution, RiskDistribution::default());
    }

    #[test]
    fn rates_and_averages() {
        let mut a = entry(AuditEventType::ApiRequest, "alice");
        a.details.insert("duration_ms".into(), json!(100));
        a.details.insert("cache_hit".into(), json!(true));
        let mut b = entry(AuditEventType::ApiRequest, "bob");
        b.success = false;
        b.risk_level = RiskLevel::High;
        b.details.insert("duration_ms".into(), json!(200));
        b.details.insert("cache_hit".into(), json!(false));
        let mut c = entry(AuditEventType::DataAccess, "alice");
        c.risk_level = RiskLevel::Medium;

        let stats = QueryStatistics::compute(&[a, b, c]);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.failed_events, 1);
        assert_eq!(stats.success_rate, 66.67);
        assert_eq!(stats.avg_response_time, 150.0);
        assert_eq!(stats.cache_hit_rate, 50.0);
        assert_eq!(stats.risk_distribution.low, 1);
        assert_eq!(stats.risk_distribution.medium, 1);
        assert_eq!(stats.risk_distribution.high, 1);
    }
}
