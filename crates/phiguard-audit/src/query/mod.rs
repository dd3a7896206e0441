//! Read path: filtering, sorting, pagination and statistics.
//!
//! Queries never fall back to partial or fabricated results. Any storage
//! failure surfaces as [`AuditError::QueryFailed`], and a query running past
//! the configured deadline is abandoned with [`AuditError::QueryTimeout`].

mod filter;
mod stats;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use phiguard_core::QueryConfig;

use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::storage::{AuditStorage, StoredEntry};

pub use filter::{AuditFilter, PageRequest, ResolvedFilter, SortField, SortOrder, TimeRange};
pub use stats::{QueryStatistics, RiskDistribution};

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of results with metadata and statistics.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub entries: Vec<AuditLogEntry>,
    pub pagination: Pagination,
    pub filters: ResolvedFilter,
    pub statistics: QueryStatistics,
}

/// Query engine over an audit store.
#[derive(Clone)]
pub struct QueryEngine {
    storage: Arc<dyn AuditStorage>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(storage: Arc<dyn AuditStorage>, config: QueryConfig) -> Self {
        Self { storage, config }
    }

    /// Run a query relative to the current time.
    pub async fn query(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<QueryResult, AuditError> {
        self.query_at(filter, page, Utc::now()).await
    }

    /// Run a query with relative ranges resolved against `now`.
    pub async fn query_at(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
        now: DateTime<Utc>,
    ) -> Result<QueryResult, AuditError> {
        let resolved = filter.resolve(now);
        let mut matching = self.fetch(&resolved).await?;
        sort_entries(&mut matching, page.sort_by, page.sort_order);

        let statistics = QueryStatistics::compute(&matching);
        let (entries, pagination) = self.paginate(matching, page);

        tracing::debug!(
            total = pagination.total,
            page = pagination.page,
            limit = pagination.limit,
            "Audit query served"
        );

        Ok(QueryResult {
            entries,
            pagination,
            filters: resolved,
            statistics,
        })
    }

    /// Every entry matching `filter`, sorted, for export.
    pub async fn matching(
        &self,
        filter: &AuditFilter,
        sort_by: SortField,
        sort_order: SortOrder,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut entries = self.fetch(&filter.resolve(now)).await?;
        sort_entries(&mut entries, sort_by, sort_order);
        Ok(entries)
    }

    /// Fetch one entry by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<StoredEntry>, AuditError> {
        self.with_timeout(self.storage.get(id)).await
    }

    /// Entries of the same user or session near `entry`, oldest first.
    pub async fn related(&self, entry: &AuditLogEntry) -> Result<Vec<AuditLogEntry>, AuditError> {
        let window = Duration::minutes(self.config.related_window_minutes);
        let resolved = ResolvedFilter {
            start: Some(entry.timestamp - window),
            end: Some(entry.timestamp + window),
            ..Default::default()
        };
        let session = entry.session_id();

        let mut related: Vec<AuditLogEntry> = self
            .fetch(&resolved)
            .await?
            .into_iter()
            .filter(|other| other.id != entry.id)
            .filter(|other| {
                other.user_id == entry.user_id
                    || session.is_some_and(|s| other.session_id() == Some(s))
            })
            .collect();
        sort_entries(&mut related, SortField::Timestamp, SortOrder::Asc);
        related.truncate(self.config.related_limit);
        Ok(related)
    }

    async fn fetch(&self, filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        self.with_timeout(self.storage.find(filter)).await
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, AuditError>>,
    ) -> Result<T, AuditError> {
        let deadline = std::time::Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_query_error() => Err(e),
            Ok(Err(e)) => Err(AuditError::QueryFailed(e.to_string())),
            Err(_) => {
                tracing::warn!(timeout_ms = self.config.timeout_ms, "Audit query timed out");
                Err(AuditError::QueryTimeout(deadline))
            }
        }
    }

    fn paginate(
        &self,
        entries: Vec<AuditLogEntry>,
        page: &PageRequest,
    ) -> (Vec<AuditLogEntry>, Pagination) {
        let requested = if page.limit == 0 {
            self.config.default_limit
        } else {
            page.limit
        };
        let limit = requested.min(self.config.max_limit).max(1);
        let page_no = page.page.max(1);
        let total = entries.len();
        let total_pages = total.div_ceil(limit);
        let offset = (page_no - 1).saturating_mul(limit);

        let slice = entries
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();

        (
            slice,
            Pagination {
                page: page_no,
                limit,
                total,
                total_pages,
                has_next: page_no < total_pages,
                has_prev: page_no > 1,
            },
        )
    }
}

/// Sort entries in place. Ties break on ID so pages are stable.
pub fn sort_entries(entries: &mut [AuditLogEntry], sort_by: SortField, order: SortOrder) {
    entries.sort_by(|a, b| {
        let primary = match sort_by {
            SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortField::DurationMs => compare_duration(a.duration_ms(), b.duration_ms()),
            SortField::RiskLevel => a.risk_level.cmp(&b.risk_level),
            SortField::UserId => a.user_id.cmp(&b.user_id),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}

fn compare_duration(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
