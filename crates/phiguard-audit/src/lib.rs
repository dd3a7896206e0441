//! # phiguard-audit
//!
//! Audit and access-control engine for workloads handling protected health
//! information (PHI).
//!
//! This crate provides:
//! - A classification registry mapping resource types to sensitivity,
//!   retention period and permitted roles
//! - Access control checks that audit every denial
//! - Risk classification of events into `low | medium | high | critical`
//! - The write path ([`AuditRecorder`]), with fire-and-forget escalation of
//!   high-risk events
//! - Retention sweeps that archive and delete expired entries
//! - The read path ([`QueryEngine`]): filters, pagination, statistics, and
//!   CSV/JSON export
//!
//! ## Failure policy
//!
//! Read-path failures always reach the caller. Write-path persistence and
//! escalation failures are degraded to warnings so audit logging never
//! blocks the operation being audited. See [`AuditError`].
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use phiguard_audit::{AuditEngine, AuditEventType, RawEvent};
//! use phiguard_core::PhiguardConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AuditEngine::from_config(PhiguardConfig::default()).await?;
//!
//! let event = RawEvent::builder(AuditEventType::LabReportUpload, "lab_tech_kim", "upload")
//!     .resource("lab_reports", "lr-1042")
//!     .patient("p-0007")
//!     .ip_address("10.0.1.12")
//!     .build();
//!
//! let result = engine.recorder().record(event).await?;
//! if !result.persisted {
//!     // The upload still succeeds; the entry went to the fallback log.
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod analysis;
pub mod classification;
pub mod details;
pub mod engine;
pub mod error;
pub mod event;
pub mod export;
pub mod fixtures;
pub mod notifier;
pub mod query;
pub mod recorder;
pub mod retention;
pub mod risk;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::{AccessDecision, AccessEvaluator, AccessRequest, RoleResolver, StaticRoleResolver};
pub use analysis::{AuditEntryDetail, SecurityAnalysis, SecurityFlag};
pub use classification::ClassificationRegistry;
pub use engine::AuditEngine;
pub use error::AuditError;
pub use event::{AuditEventType, AuditLogEntry, RawEvent, RawEventBuilder, RiskContext, RiskLevel};
pub use export::{ExportFile, ExportFormat};
pub use notifier::{
    EscalationNotifier, EscalationPayload, LogNotifier, NoopNotifier, WebhookNotifier,
};
pub use query::{
    AuditFilter, PageRequest, Pagination, QueryEngine, QueryResult, QueryStatistics, SortField,
    SortOrder, TimeRange,
};
pub use recorder::{AuditRecorder, RecordResult, RecordWarning};
pub use retention::{RetentionAction, RetentionDecision, RetentionEngine, SweepReport};
pub use risk::{RiskAssessment, RiskClassifier};
pub use storage::{
    AuditStorage, ColdStore, FileColdStore, FileStorage, MemoryColdStore, MemoryStorage,
    PostgresStorage, RecordState, StoredEntry,
};
