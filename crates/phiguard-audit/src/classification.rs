//! Data classification registry.
//!
//! Built once from configuration and shared read-only (behind `Arc`) by the
//! access evaluator, the recorder and the retention engine.

use std::collections::HashMap;

use phiguard_core::{DataClassification, PhiguardConfig};

use crate::error::AuditError;

/// Immutable mapping from resource type to classification.
#[derive(Debug, Clone)]
pub struct ClassificationRegistry {
    entries: HashMap<String, DataClassification>,
    fallback: DataClassification,
}

impl ClassificationRegistry {
    /// Create a registry from explicit entries and a fallback classification.
    pub fn new(
        entries: HashMap<String, DataClassification>,
        fallback: DataClassification,
    ) -> Self {
        Self { entries, fallback }
    }

    /// Create a registry from configuration.
    pub fn from_config(config: &PhiguardConfig) -> Self {
        Self::new(
            config.classifications.clone(),
            config.default_classification.clone(),
        )
    }

    /// Look up a resource type.
    pub fn classify(&self, resource_type: &str) -> Result<&DataClassification, AuditError> {
        self.entries
            .get(resource_type)
            .ok_or_else(|| AuditError::UnknownResourceType(resource_type.to_string()))
    }

    /// Look up a resource type, falling back to the default classification.
    pub fn classify_or_default(&self, resource_type: &str) -> &DataClassification {
        self.entries.get(resource_type).unwrap_or(&self.fallback)
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// The fallback classification.
    pub fn fallback(&self) -> &DataClassification {
        &self.fallback
    }
}
