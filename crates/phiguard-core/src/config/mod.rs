//! Configuration types for the phiguard audit engine.
//!
//! Configuration is loaded from a YAML file (`phiguard.yaml`) and, optionally,
//! a separate classification registry file referenced by `classifications_file`.
//! Every section has defaults, so an empty file yields a working configuration.

pub mod access;
pub mod audit;
pub mod classification;
pub mod dashboard;
pub mod escalation;
pub mod query;
pub mod retention;
pub mod risk;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use access::AccessConfig;
pub use audit::{AuditConfig, StorageBackend, StorageConfig};
pub use classification::DataClassification;
pub use dashboard::DashboardConfig;
pub use escalation::EscalationConfig;
pub use query::QueryConfig;
pub use retention::RetentionConfig;
pub use risk::{BusinessHours, RiskPolicyConfig, RiskThresholds, RiskWeights};

/// Complete phiguard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhiguardConfig {
    /// Deployment name, used in log lines.
    #[serde(default)]
    pub project: Option<String>,

    /// Audit recording and storage.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Classification registry, keyed by resource type.
    #[serde(default = "classification::default_classifications")]
    pub classifications: HashMap<String, DataClassification>,

    /// Path to a YAML file with the classification registry (alternative to inline).
    #[serde(default)]
    pub classifications_file: Option<PathBuf>,

    /// Classification applied by the recorder to unknown resource types.
    #[serde(default = "classification::default_classification")]
    pub default_classification: DataClassification,

    /// Access control evaluator settings.
    #[serde(default)]
    pub access: AccessConfig,

    /// Risk classification policy.
    #[serde(default)]
    pub risk: RiskPolicyConfig,

    /// Retention sweep settings.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Query engine settings.
    #[serde(default)]
    pub query: QueryConfig,

    /// Escalation channel.
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// HTTP API.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for PhiguardConfig {
    fn default() -> Self {
        Self {
            project: None,
            audit: AuditConfig::default(),
            classifications: classification::default_classifications(),
            classifications_file: None,
            default_classification: classification::default_classification(),
            access: AccessConfig::default(),
            risk: RiskPolicyConfig::default(),
            retention: RetentionConfig::default(),
            query: QueryConfig::default(),
            escalation: EscalationConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PhiguardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration, resolve the external classification file, and validate.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(file) = &config.classifications_file {
            let registry_path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };

            if !registry_path.exists() {
                return Err(ConfigError::Config(format!(
                    "classifications file '{}' not found",
                    registry_path.display()
                )));
            }
            let content = fs::read_to_string(&registry_path)?;
            config.classifications = serde_yaml::from_str(&content)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifications.is_empty() {
            return Err(ConfigError::Config(
                "classification registry must not be empty".to_string(),
            ));
        }

        let all = self
            .classifications
            .iter()
            .map(|(name, c)| (name.as_str(), c))
            .chain(std::iter::once(("default_classification", &self.default_classification)));
        for (name, classification) in all {
            if classification.retention_period_days == 0 {
                return Err(ConfigError::Config(format!(
                    "classification '{}': retention_period_days must be > 0",
                    name
                )));
            }
            if classification.access_controls.is_empty() {
                return Err(ConfigError::Config(format!(
                    "classification '{}': access_controls must name at least one role",
                    name
                )));
            }
        }

        let t = &self.risk.thresholds;
        if !(t.medium < t.high && t.high < t.critical) {
            return Err(ConfigError::Config(format!(
                "risk thresholds must increase: medium={} high={} critical={}",
                t.medium, t.high, t.critical
            )));
        }

        for (event_type, minimum) in risk::MANDATORY_FLOORS {
            if let Some(&level) = self.risk.floors.get(&event_type)
                && level < minimum
            {
                return Err(ConfigError::Config(format!(
                    "risk floor for {} must be at least {}, got {}",
                    event_type, minimum, level
                )));
            }
        }

        let hours = &self.risk.business_hours;
        if hours.start_hour > 24 || hours.end_hour > 24 || hours.start_hour > hours.end_hour {
            return Err(ConfigError::Config(format!(
                "invalid business hours {}..{}",
                hours.start_hour, hours.end_hour
            )));
        }

        if self.query.max_limit == 0 || self.query.default_limit == 0 {
            return Err(ConfigError::Config(
                "query limits must be greater than zero".to_string(),
            ));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::Config(format!(
                "query.default_limit ({}) must not exceed query.max_limit ({})",
                self.query.default_limit, self.query.max_limit
            )));
        }

        if self.retention.sweep_batch_size == 0 {
            return Err(ConfigError::Config(
                "retention.sweep_batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditEventType, RiskLevel, SensitivityLevel};
    use std::io::Write;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = PhiguardConfig::from_yaml("").unwrap();
        assert!(config.classifications.contains_key("lab_reports"));
        assert_eq!(config.query.max_limit, 100);
        assert_eq!(config.retention.archive_window_days, 30);
        config.validate().unwrap();
    }

    #[test]
    fn parses_sections_and_floors() {
        let yaml = r#"
project: clinic
audit:
  storage:
    backend: file
    file_path: /tmp/audit.log
risk:
  thresholds: { medium: 10, high: 40, critical: 70 }
  floors:
    data_deletion: high
query:
  max_limit: 25
"#;
        let config = PhiguardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.project.as_deref(), Some("clinic"));
        assert_eq!(config.audit.storage.backend, StorageBackend::File);
        assert_eq!(config.risk.thresholds.medium, 10);
        assert_eq!(
            config.risk.floor_for(AuditEventType::DataDeletion),
            RiskLevel::High
        );
        assert_eq!(config.risk.floor_for(AuditEventType::Logout), RiskLevel::Low);
        assert_eq!(config.query.max_limit, 25);
        assert_eq!(config.query.default_limit, 50);
    }

    #[test]
    fn partial_floors_keep_the_defaults() {
        let yaml = r#"
risk:
  floors:
    print_data: high
"#;
        let config = PhiguardConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.risk.floor_for(AuditEventType::PrintData), RiskLevel::High);
        assert_eq!(
            config.risk.floor_for(AuditEventType::FailedAccess),
            RiskLevel::Medium
        );
        assert_eq!(
            config.risk.floor_for(AuditEventType::DataDeletion),
            RiskLevel::Medium
        );
        assert_eq!(
            config.risk.floor_for(AuditEventType::SecurityEvent),
            RiskLevel::High
        );
    }

    #[test]
    fn mandatory_floors_cannot_be_lowered() {
        let yaml = r#"
risk:
  floors:
    failed_access: low
"#;
        let config = PhiguardConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("failed_access"));
        assert_eq!(
            config.risk.floor_for(AuditEventType::FailedAccess),
            RiskLevel::Medium
        );

        let mut config = PhiguardConfig::default();
        config.risk.floors.clear();
        assert_eq!(
            config.risk.floor_for(AuditEventType::DataDeletion),
            RiskLevel::Medium
        );
    }

    #[test]
    fn rejects_zero_retention() {
        let mut config = PhiguardConfig::default();
        if let Some(c) = config.classifications.get_mut("lab_reports") {
            c.retention_period_days = 0;
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lab_reports"));
    }

    #[test]
    fn rejects_default_limit_above_max() {
        let mut config = PhiguardConfig::default();
        config.query.default_limit = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn rejects_non_monotonic_thresholds() {
        let mut config = PhiguardConfig::default();
        config.risk.thresholds.high = config.risk.thresholds.critical;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_external_classification_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("classifications.yaml");
        let mut registry = fs::File::create(&registry_path).unwrap();
        writeln!(
            registry,
            r#"
imaging:
  level: restricted
  categories: [PHI]
  retention_period_days: 3650
  encryption_required: true
  access_controls: [radiologist]
"#
        )
        .unwrap();

        let config_path = dir.path().join("phiguard.yaml");
        fs::write(&config_path, "classifications_file: classifications.yaml\n").unwrap();

        let config = PhiguardConfig::load_with_context(&config_path).unwrap();
        assert_eq!(config.classifications.len(), 1);
        let imaging = &config.classifications["imaging"];
        assert_eq!(imaging.level, SensitivityLevel::Restricted);
        assert!(imaging.holds_phi());
        assert!(imaging.access_controls.contains("radiologist"));
    }

    #[test]
    fn missing_classification_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("phiguard.yaml");
        fs::write(&config_path, "classifications_file: missing.yaml\n").unwrap();
        assert!(PhiguardConfig::load_with_context(&config_path).is_err());
    }
}
