//! `phiguard evaluate` - retention decision for one record.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

use phiguard_audit::{ClassificationRegistry, RetentionDecision, retention};
use phiguard_core::PhiguardConfig;

pub fn run(
    config_path: &Path,
    resource_type: &str,
    created_at: Option<DateTime<Utc>>,
    age_days: Option<i64>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let now = Utc::now();
    let created_at = match (created_at, age_days) {
        (Some(at), _) => at,
        (None, Some(days)) if days >= 0 => now - Duration::days(days),
        (None, Some(days)) => bail!("--age-days must not be negative, got {}", days),
        (None, None) => bail!("one of --created-at or --age-days is required"),
    };

    let decision = evaluate(&config, resource_type, created_at, now)?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn evaluate(
    config: &PhiguardConfig,
    resource_type: &str,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<RetentionDecision> {
    let registry = ClassificationRegistry::from_config(config);
    let classification = registry.classify(resource_type)?;
    Ok(retention::decide(
        resource_type,
        classification.retention_period_days,
        created_at,
        now,
        config.retention.archive_window_days,
    ))
}
