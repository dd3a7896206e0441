//! Data classification registry configuration.
//!
//! Each resource type the system recognizes maps to one [`DataClassification`]:
//! its sensitivity level, the data categories it holds, how long records about
//! it are retained, and which roles may act on it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::SensitivityLevel;

/// Static classification of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataClassification {
    /// Sensitivity level.
    pub level: SensitivityLevel,

    /// Data category labels (e.g. PII, PHI, biometric).
    #[serde(default)]
    pub categories: BTreeSet<String>,

    /// Retention period in days. Must be greater than zero.
    pub retention_period_days: u32,

    /// Whether the data must be encrypted at rest.
    #[serde(default)]
    pub encryption_required: bool,

    /// Roles permitted to act on this resource type.
    #[serde(default)]
    pub access_controls: BTreeSet<String>,
}

impl DataClassification {
    fn new(
        level: SensitivityLevel,
        categories: &[&str],
        retention_period_days: u32,
        encryption_required: bool,
        roles: &[&str],
    ) -> Self {
        Self {
            level,
            categories: categories.iter().map(|s| s.to_string()).collect(),
            retention_period_days,
            encryption_required,
            access_controls: roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether this resource type holds protected health information.
    pub fn holds_phi(&self) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case("phi"))
    }
}

/// Fallback classification for resource types missing from the registry.
///
/// Strict on purpose: long retention, admin-only access.
pub fn default_classification() -> DataClassification {
    DataClassification::new(
        SensitivityLevel::Confidential,
        &[],
        2190,
        true,
        &["admin", "compliance_officer"],
    )
}

/// Built-in registry entries.
pub fn default_classifications() -> HashMap<String, DataClassification> {
    use SensitivityLevel::*;

    let mut map = HashMap::new();
    map.insert(
        "lab_reports".to_string(),
        DataClassification::new(
            Restricted,
            &["PHI", "medical"],
            2555,
            true,
            &["patient", "physician", "lab_technician", "data_owner", "admin"],
        ),
    );
    map.insert(
        "biomarkers".to_string(),
        DataClassification::new(
            Restricted,
            &["PHI", "biometric"],
            2555,
            true,
            &["patient", "physician", "lab_technician", "data_owner"],
        ),
    );
    map.insert(
        "health_alerts".to_string(),
        DataClassification::new(
            Confidential,
            &["PHI"],
            1095,
            true,
            &["patient", "physician", "nurse", "data_owner"],
        ),
    );
    map.insert(
        "medical_records".to_string(),
        DataClassification::new(
            Restricted,
            &["PHI", "PII"],
            2555,
            true,
            &["physician", "nurse", "data_owner"],
        ),
    );
    map.insert(
        "user_profiles".to_string(),
        DataClassification::new(
            Confidential,
            &["PII"],
            1095,
            true,
            &["patient", "admin", "data_owner"],
        ),
    );
    map.insert(
        "audit_logs".to_string(),
        DataClassification::new(
            Restricted,
            &["security"],
            2190,
            true,
            &["admin", "compliance_officer"],
        ),
    );
    map.insert(
        "system".to_string(),
        DataClassification::new(Internal, &["operational"], 365, false, &["admin", "system"]),
    );
    map.insert(
        "api".to_string(),
        DataClassification::new(
            Internal,
            &["operational"],
            90,
            false,
            &["admin", "system", "compliance_officer"],
        ),
    );
    map
}
