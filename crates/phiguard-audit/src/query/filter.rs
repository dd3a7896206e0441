//! Query filters.
//!
//! [`AuditFilter`] is what callers send: optional, AND-combined criteria with
//! calendar dates and a relative `time_range`. [`AuditFilter::resolve`] turns
//! it into a [`ResolvedFilter`] with concrete instants, which storage
//! backends evaluate with [`ResolvedFilter::matches`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use phiguard_core::{AuditEventType, ParseEnumError, RiskLevel};

use crate::event::AuditLogEntry;

/// Relative time window ending at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "6h")]
    Last6Hours,
    #[serde(rename = "12h")]
    Last12Hours,
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 7] = [
        Self::LastHour,
        Self::Last6Hours,
        Self::Last12Hours,
        Self::Last24Hours,
        Self::Last7Days,
        Self::Last30Days,
        Self::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastHour => "1h",
            Self::Last6Hours => "6h",
            Self::Last12Hours => "12h",
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::All => "all",
        }
    }

    /// Window length, `None` for [`TimeRange::All`].
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::LastHour => Some(Duration::hours(1)),
            Self::Last6Hours => Some(Duration::hours(6)),
            Self::Last12Hours => Some(Duration::hours(12)),
            Self::Last24Hours => Some(Duration::hours(24)),
            Self::Last7Days => Some(Duration::days(7)),
            Self::Last30Days => Some(Duration::days(30)),
            Self::All => None,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "time range",
                value: s.to_string(),
            })
    }
}

/// Caller-facing filter set. Every criterion is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub resource_type: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub action: Option<String>,
    pub success: Option<bool>,
    pub risk_level: Option<RiskLevel>,
    pub ip_address: Option<String>,
    /// First day included (UTC).
    pub start_date: Option<NaiveDate>,
    /// Last day included (UTC), through 23:59:59.999.
    pub end_date: Option<NaiveDate>,
    /// Ignored when either explicit date is set.
    #[serde(alias = "timeRange")]
    pub time_range: Option<TimeRange>,
    pub search: Option<String>,
    pub http_method: Option<String>,
    /// Lower duration bound in milliseconds, inclusive.
    pub min_duration: Option<f64>,
    /// Upper duration bound in milliseconds, inclusive.
    pub max_duration: Option<f64>,
    pub cache_hit: Option<bool>,
}

impl AuditFilter {
    /// Resolve relative and calendar criteria against `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> ResolvedFilter {
        let (start, end) = if self.start_date.is_some() || self.end_date.is_some() {
            (
                self.start_date.map(start_of_day),
                self.end_date.map(end_of_day),
            )
        } else {
            let start = self
                .time_range
                .and_then(|range| range.duration())
                .map(|window| now - window);
            (start, None)
        };

        ResolvedFilter {
            user_id: non_empty(&self.user_id),
            resource_type: non_empty(&self.resource_type),
            event_type: self.event_type,
            action: non_empty(&self.action),
            success: self.success,
            risk_level: self.risk_level,
            ip_address: non_empty(&self.ip_address),
            start,
            end,
            search: non_empty(&self.search).map(|s| s.to_lowercase()),
            http_method: non_empty(&self.http_method).map(|m| m.to_ascii_uppercase()),
            min_duration_ms: self.min_duration,
            max_duration_ms: self.max_duration,
            cache_hit: self.cache_hit,
        }
    }

    /// Label for the time window, used in export filenames.
    pub fn range_label(&self) -> String {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{}_to_{}", start, end),
            (Some(start), None) => format!("from_{}", start),
            (None, Some(end)) => format!("until_{}", end),
            (None, None) => self.time_range.unwrap_or(TimeRange::All).as_str().to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last_milli).and_utc()
}

/// Filter with concrete bounds, evaluated against stored entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<AuditEventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Lowercased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Uppercased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

impl ResolvedFilter {
    /// Whether `entry` satisfies every criterion.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if self.user_id.as_ref().is_some_and(|u| *u != entry.user_id) {
            return false;
        }
        if self
            .resource_type
            .as_ref()
            .is_some_and(|r| *r != entry.resource_type)
        {
            return false;
        }
        if self.event_type.is_some_and(|t| t != entry.event_type) {
            return false;
        }
        if self
            .action
            .as_ref()
            .is_some_and(|a| !a.eq_ignore_ascii_case(&entry.action))
        {
            return false;
        }
        if self.success.is_some_and(|s| s != entry.success) {
            return false;
        }
        if self.risk_level.is_some_and(|r| r != entry.risk_level) {
            return false;
        }
        if let Some(ip) = &self.ip_address
            && entry.ip_address.as_deref() != Some(ip.as_str())
        {
            return false;
        }
        if self.start.is_some_and(|start| entry.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.timestamp > end) {
            return false;
        }
        if let Some(method) = &self.http_method
            && !entry
                .http_method()
                .is_some_and(|m| m.eq_ignore_ascii_case(method))
        {
            return false;
        }
        if let Some(min) = self.min_duration_ms
            && !entry.duration_ms().is_some_and(|d| d >= min)
        {
            return false;
        }
        if let Some(max) = self.max_duration_ms
            && !entry.duration_ms().is_some_and(|d| d <= max)
        {
            return false;
        }
        if self.cache_hit.is_some() && entry.cache_hit() != self.cache_hit {
            return false;
        }
        if let Some(needle) = &self.search
            && !search_matches(entry, needle)
        {
            return false;
        }
        true
    }
}

fn search_matches(entry: &AuditLogEntry, needle: &str) -> bool {
    let fields = [
        Some(entry.user_id.as_str()),
        Some(entry.resource_type.as_str()),
        Some(entry.action.as_str()),
        entry.ip_address.as_deref(),
        entry.endpoint(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Timestamp,
    DurationMs,
    RiskLevel,
    UserId,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Page, size and ordering of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// 1-indexed; 0 is treated as 1.
    pub page: usize,
    /// 0 means the configured default; capped at the configured maximum.
    pub limit: usize,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page,
            limit,
            ..Default::default()
        }
    }

    pub fn sorted(mut self, sort_by: SortField, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }
}
