//! Retention policy engine.
//!
//! `evaluate` is a pure function of a record's age and its classification's
//! retention period. `run_sweep` walks the store in ID-ordered batches and
//! applies each decision:
//!
//! - `delete` removes the record;
//! - `archive` copies it to the cold store, then marks it `archived`;
//! - `retain` does nothing.
//!
//! Every change goes through the store's compare-and-set transition, so a
//! second sweep (or a concurrent one) finds nothing left to do. Records
//! written during a sweep may or may not be visited; the next cycle gets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use phiguard_core::RetentionConfig;

use crate::classification::ClassificationRegistry;
use crate::error::AuditError;
use crate::storage::{AuditStorage, ColdStore, RecordState, StoredEntry};

/// What to do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionAction {
    Retain,
    Archive,
    Delete,
}

impl RetentionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RetentionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention decision for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionDecision {
    pub resource_type: String,
    pub retention_period_days: u32,
    pub resource_age_days: i64,
    pub days_until_expiry: i64,
    pub action: RetentionAction,
}

/// Decide from a retention period and a record age.
pub fn decide(
    resource_type: &str,
    retention_period_days: u32,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    archive_window_days: i64,
) -> RetentionDecision {
    let resource_age_days = (now - created_at).num_days();
    let days_until_expiry = i64::from(retention_period_days) - resource_age_days;
    let action = if days_until_expiry <= 0 {
        RetentionAction::Delete
    } else if days_until_expiry <= archive_window_days {
        RetentionAction::Archive
    } else {
        RetentionAction::Retain
    };
    RetentionDecision {
        resource_type: resource_type.to_string(),
        retention_period_days,
        resource_age_days,
        days_until_expiry,
        action,
    }
}

/// Counters from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub archived: usize,
    pub deleted: usize,
    pub retained: usize,
    /// Records already in the target state, or taken by a concurrent sweep.
    pub skipped: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

impl SweepReport {
    fn absorb(&mut self, other: &SweepReport) {
        self.scanned += other.scanned;
        self.archived += other.archived;
        self.deleted += other.deleted;
        self.retained += other.retained;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// One processed batch and where to resume.
#[derive(Debug, Clone)]
pub struct SweepBatch {
    pub report: SweepReport,
    /// Last ID visited; `None` when the store is exhausted.
    pub next_cursor: Option<Uuid>,
}

enum Applied {
    Archived,
    Deleted,
    Retained,
    Skipped,
}

/// Applies retention policy to the audit store.
pub struct RetentionEngine {
    storage: Arc<dyn AuditStorage>,
    cold: Arc<dyn ColdStore>,
    registry: Arc<ClassificationRegistry>,
    config: RetentionConfig,
}

impl RetentionEngine {
    pub fn new(
        storage: Arc<dyn AuditStorage>,
        cold: Arc<dyn ColdStore>,
        registry: Arc<ClassificationRegistry>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            storage,
            cold,
            registry,
            config,
        }
    }

    /// Decision for a record of `resource_type` created at `created_at`.
    pub fn evaluate(
        &self,
        resource_type: &str,
        created_at: DateTime<Utc>,
    ) -> Result<RetentionDecision, AuditError> {
        self.evaluate_at(resource_type, created_at, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        resource_type: &str,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RetentionDecision, AuditError> {
        let classification = self.registry.classify(resource_type)?;
        Ok(decide(
            resource_type,
            classification.retention_period_days,
            created_at,
            now,
            self.config.archive_window_days,
        ))
    }

    /// Sweep the whole store.
    pub async fn run_sweep(&self) -> Result<SweepReport, AuditError> {
        self.run_sweep_at(Utc::now()).await
    }

    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, AuditError> {
        let started = Instant::now();
        let mut report = SweepReport::default();
        let mut cursor = None;

        loop {
            let batch = self.sweep_batch(cursor, now).await?;
            report.absorb(&batch.report);
            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if report.archived + report.deleted > 0
            && let Err(e) = self.storage.compact().await
        {
            report.errors += 1;
            tracing::error!(error = %e, "Failed to compact audit store after sweep");
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            scanned = report.scanned,
            archived = report.archived,
            deleted = report.deleted,
            retained = report.retained,
            skipped = report.skipped,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Process one batch after `after`. Resume with the returned cursor.
    pub async fn sweep_batch(
        &self,
        after: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<SweepBatch, AuditError> {
        let records = self
            .storage
            .scan(after, self.config.sweep_batch_size)
            .await?;
        let mut report = SweepReport::default();

        let next_cursor = if records.len() < self.config.sweep_batch_size {
            None
        } else {
            records.last().map(|r| r.entry.id)
        };

        for record in &records {
            report.scanned += 1;
            match self.apply(record, now).await {
                Ok(Applied::Archived) => report.archived += 1,
                Ok(Applied::Deleted) => report.deleted += 1,
                Ok(Applied::Retained) => report.retained += 1,
                Ok(Applied::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(event_id = %record.entry.id, "Retention action failed: {}", e);
                }
            }
        }

        Ok(SweepBatch {
            report,
            next_cursor,
        })
    }

    async fn apply(&self, record: &StoredEntry, now: DateTime<Utc>) -> Result<Applied, AuditError> {
        let entry = &record.entry;
        let classification = self.registry.classify_or_default(&entry.resource_type);
        let decision = decide(
            &entry.resource_type,
            classification.retention_period_days,
            entry.timestamp,
            now,
            self.config.archive_window_days,
        );

        match (decision.action, record.state) {
            (RetentionAction::Delete, RecordState::Active | RecordState::Archived) => {
                let done = self
                    .storage
                    .transition(entry.id, record.state, RecordState::Deleted)
                    .await?;
                if done {
                    tracing::debug!(event_id = %entry.id, "Expired audit entry deleted");
                    Ok(Applied::Deleted)
                } else {
                    Ok(Applied::Skipped)
                }
            }
            (RetentionAction::Archive, RecordState::Active) => {
                // The cold copy goes first; it is idempotent by ID, so losing the
                // state race below leaves nothing duplicated.
                self.cold.archive(entry).await?;
                let done = self
                    .storage
                    .transition(entry.id, RecordState::Active, RecordState::Archived)
                    .await?;
                Ok(if done { Applied::Archived } else { Applied::Skipped })
            }
            (RetentionAction::Retain, _) => Ok(Applied::Retained),
            _ => Ok(Applied::Skipped),
        }
    }
}
