//! Access control evaluator.
//!
//! Allow iff the principal's role is listed in the resource type's
//! `access_controls`. Unknown resource types are denied. Principals whose
//! role cannot be resolved get the lowest-privilege role instead of an error.
//!
//! Every denial is recorded as a `failed_access` entry. The first granted
//! access per principal to a restricted resource type is recorded as
//! `data_access` when `audit_first_allow` is on.

use async_trait::async_trait;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use phiguard_core::{AccessConfig, AuditEventType, SensitivityLevel};

use crate::classification::ClassificationRegistry;
use crate::error::AuditError;
use crate::event::RawEvent;
use crate::recorder::AuditRecorder;

pub const REASON_UNKNOWN_RESOURCE_TYPE: &str = "unknown_resource_type";
pub const REASON_INSUFFICIENT_PERMISSIONS: &str = "insufficient_permissions";

/// Principal used when a request carries no user ID.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Resolves a principal to its role.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// `None` when the principal has no known role.
    async fn resolve(&self, user_id: &str) -> Option<String>;
}

/// Role resolver backed by a fixed principal map.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleResolver {
    roles: HashMap<String, String>,
}

impl StaticRoleResolver {
    pub fn new(roles: HashMap<String, String>) -> Self {
        Self { roles }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.principals.clone())
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, user_id: &str) -> Option<String> {
        self.roles.get(user_id).cloned()
    }
}

/// An access check request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessRequest {
    #[serde(default)]
    pub user_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Role the decision was made for.
    pub role: String,
    /// Audit entry written for this decision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_entry_id: Option<Uuid>,
}

impl AccessDecision {
    fn allow(role: &str) -> Self {
        Self {
            allowed: true,
            reason: None,
            role: role.to_string(),
            audit_entry_id: None,
        }
    }

    fn deny(role: &str, reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            role: role.to_string(),
            audit_entry_id: None,
        }
    }
}

/// Evaluates access against the classification registry.
pub struct AccessEvaluator {
    registry: Arc<ClassificationRegistry>,
    resolver: Arc<dyn RoleResolver>,
    recorder: Arc<AuditRecorder>,
    lowest_privilege_role: String,
    audit_first_allow: bool,
    seen_allows: DashSet<(String, String)>,
}

impl AccessEvaluator {
    pub fn new(
        config: &AccessConfig,
        registry: Arc<ClassificationRegistry>,
        resolver: Arc<dyn RoleResolver>,
        recorder: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            registry,
            resolver,
            recorder,
            lowest_privilege_role: config.lowest_privilege_role.clone(),
            audit_first_allow: config.audit_first_allow,
            seen_allows: DashSet::new(),
        }
    }

    /// Decide without side effects.
    pub fn evaluate(&self, role: &str, resource_type: &str, _action: &str) -> AccessDecision {
        match self.registry.classify(resource_type) {
            Err(_) => AccessDecision::deny(role, REASON_UNKNOWN_RESOURCE_TYPE),
            Ok(classification) if classification.access_controls.contains(role) => {
                AccessDecision::allow(role)
            }
            Ok(_) => AccessDecision::deny(role, REASON_INSUFFICIENT_PERMISSIONS),
        }
    }

    /// Resolve the principal's role, decide, and record the audit trail.
    pub async fn check_access(&self, request: &AccessRequest) -> Result<AccessDecision, AuditError> {
        if request.action.trim().is_empty() {
            return Err(AuditError::Validation(
                "missing required field(s): action".to_string(),
            ));
        }
        let user_id = match request.user_id.trim() {
            "" => ANONYMOUS_PRINCIPAL,
            id => id,
        };

        let role = match self.resolver.resolve(user_id).await {
            Some(role) => role,
            None => {
                tracing::debug!(
                    user_id,
                    role = %self.lowest_privilege_role,
                    "Role not resolved, using lowest-privilege role"
                );
                self.lowest_privilege_role.clone()
            }
        };

        let mut decision = self.evaluate(&role, &request.resource_type, &request.action);

        let event = if !decision.allowed {
            tracing::info!(
                user_id,
                role = %role,
                resource_type = %request.resource_type,
                action = %request.action,
                reason = decision.reason.as_deref().unwrap_or_default(),
                "Access denied"
            );
            Some(
                self.audit_event(AuditEventType::FailedAccess, user_id, request)
                    .success(false)
                    .detail("reason", decision.reason.clone().unwrap_or_default())
                    .detail("role", role.clone())
                    .build(),
            )
        } else if self.audit_first_allow
            && self.is_restricted(&request.resource_type)
            && self
                .seen_allows
                .insert((user_id.to_string(), request.resource_type.clone()))
        {
            Some(
                self.audit_event(AuditEventType::DataAccess, user_id, request)
                    .detail("first_access", true)
                    .detail("role", role.clone())
                    .build(),
            )
        } else {
            None
        };

        if let Some(event) = event {
            let result = self.recorder.record(event).await?;
            decision.audit_entry_id = Some(result.entry.id);
        }
        Ok(decision)
    }

    fn is_restricted(&self, resource_type: &str) -> bool {
        self.registry
            .classify(resource_type)
            .is_ok_and(|c| c.level == SensitivityLevel::Restricted)
    }

    fn audit_event(
        &self,
        event_type: AuditEventType,
        user_id: &str,
        request: &AccessRequest,
    ) -> crate::event::RawEventBuilder {
        let mut builder = RawEvent::builder(event_type, user_id, request.action.trim())
            .resource_type(request.resource_type.clone());
        if let Some(id) = &request.resource_id {
            builder = builder.resource(request.resource_type.clone(), id.clone());
        }
        if let Some(ip) = &request.ip_address {
            builder = builder.ip_address(ip.clone());
        }
        if let Some(agent) = &request.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
    }
}
