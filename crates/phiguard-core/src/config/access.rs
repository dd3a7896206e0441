//! Access control configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the access control evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Role assumed for principals whose role cannot be resolved.
    #[serde(default = "default_lowest_privilege_role")]
    pub lowest_privilege_role: String,

    /// Static principal-to-role assignments used by the built-in resolver.
    #[serde(default)]
    pub principals: HashMap<String, String>,

    /// Record the first granted access per principal to restricted resources.
    #[serde(default = "default_true")]
    pub audit_first_allow: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            lowest_privilege_role: default_lowest_privilege_role(),
            principals: HashMap::new(),
            audit_first_allow: true,
        }
    }
}

fn default_lowest_privilege_role() -> String {
    "guest".to_string()
}

fn default_true() -> bool {
    true
}
