//! Wiring of the audit components from configuration.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use phiguard_core::PhiguardConfig;

use crate::access::{AccessEvaluator, RoleResolver, StaticRoleResolver};
use crate::analysis::{AuditEntryDetail, analyze};
use crate::classification::ClassificationRegistry;
use crate::error::AuditError;
use crate::export::{ExportFile, ExportFormat, export};
use crate::fixtures::seed_fixtures;
use crate::notifier::{EscalationNotifier, create_notifier};
use crate::query::{AuditFilter, QueryEngine, SortField, SortOrder};
use crate::recorder::AuditRecorder;
use crate::retention::RetentionEngine;
use crate::storage::{AuditStorage, ColdStore, create_cold_store, create_storage};

/// All audit components sharing one store and one registry.
pub struct AuditEngine {
    config: Arc<PhiguardConfig>,
    registry: Arc<ClassificationRegistry>,
    storage: Arc<dyn AuditStorage>,
    recorder: Arc<AuditRecorder>,
    access: AccessEvaluator,
    query: QueryEngine,
    retention: RetentionEngine,
}

impl AuditEngine {
    /// Build every component from configuration, opening the configured stores.
    pub async fn from_config(config: PhiguardConfig) -> Result<Self, AuditError> {
        let storage = create_storage(&config.audit).await?;
        let cold = create_cold_store(&config.audit)?;
        let notifier = create_notifier(&config.escalation)?;
        let resolver = Arc::new(StaticRoleResolver::from_config(&config.access));

        let engine = Self::with_parts(config, storage, cold, notifier, resolver);

        if engine.config.audit.seed_fixtures {
            seed_fixtures(
                &engine.storage,
                engine.recorder.classifier(),
                &engine.registry,
                engine.config.audit.fixture_count,
                Utc::now(),
            )
            .await?;
        }

        tracing::info!(
            project = engine.config.project.as_deref().unwrap_or("phiguard"),
            backend = ?engine.config.audit.storage.backend,
            resource_types = engine.registry.resource_types().len(),
            "Audit engine ready"
        );
        Ok(engine)
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        config: PhiguardConfig,
        storage: Arc<dyn AuditStorage>,
        cold: Arc<dyn ColdStore>,
        notifier: Arc<dyn EscalationNotifier>,
        resolver: Arc<dyn RoleResolver>,
    ) -> Self {
        let registry = Arc::new(ClassificationRegistry::from_config(&config));
        let recorder = Arc::new(AuditRecorder::from_config(
            &config,
            Arc::clone(&storage),
            Arc::clone(&registry),
            notifier,
        ));
        let access = AccessEvaluator::new(
            &config.access,
            Arc::clone(&registry),
            resolver,
            Arc::clone(&recorder),
        );
        let query = QueryEngine::new(Arc::clone(&storage), config.query.clone());
        let retention = RetentionEngine::new(
            Arc::clone(&storage),
            cold,
            Arc::clone(&registry),
            config.retention.clone(),
        );

        Self {
            config: Arc::new(config),
            registry,
            storage,
            recorder,
            access,
            query,
            retention,
        }
    }

    pub fn registry(&self) -> &ClassificationRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn AuditStorage> {
        &self.storage
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    pub fn access(&self) -> &AccessEvaluator {
        &self.access
    }

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    pub fn retention(&self) -> &RetentionEngine {
        &self.retention
    }

    /// Fetch one entry with its security analysis and related events.
    pub async fn get_detail(&self, id: Uuid) -> Result<Option<AuditEntryDetail>, AuditError> {
        let Some(stored) = self.query.get(id).await? else {
            return Ok(None);
        };
        let related_events = self.query.related(&stored.entry).await?;
        let security_analysis = analyze(&stored.entry, &self.config.risk.business_hours);
        Ok(Some(AuditEntryDetail {
            entry: stored.entry,
            state: stored.state,
            security_analysis,
            related_events,
        }))
    }

    /// Export every entry matching `filter`, newest first.
    pub async fn export(
        &self,
        filter: &AuditFilter,
        format: ExportFormat,
    ) -> Result<ExportFile, AuditError> {
        let now = Utc::now();
        let entries = self
            .query
            .matching(filter, SortField::Timestamp, SortOrder::Desc, now)
            .await?;
        export(&entries, format, filter, &filter.resolve(now), now)
    }
}
