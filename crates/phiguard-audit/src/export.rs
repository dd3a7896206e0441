//! CSV and JSON serialization of query results.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use phiguard_core::ParseEnumError;

use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::query::{AuditFilter, ResolvedFilter};

/// Fixed CSV column order.
pub const CSV_COLUMNS: [&str; 13] = [
    "id",
    "timestamp",
    "event_type",
    "user_id",
    "patient_id",
    "resource_type",
    "resource_id",
    "action",
    "ip_address",
    "user_agent",
    "success",
    "risk_level",
    "details",
];

/// Text of the placeholder row written when nothing matched.
pub const EMPTY_EXPORT_MESSAGE: &str = "No audit entries match the selected filters";

/// Export format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ParseEnumError {
                kind: "export format",
                value: s.to_string(),
            }),
        }
    }
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    exported_at: String,
    total: usize,
    filters: &'a ResolvedFilter,
    entries: &'a [AuditLogEntry],
}

/// Render entries in the requested format.
pub fn export(
    entries: &[AuditLogEntry],
    format: ExportFormat,
    filter: &AuditFilter,
    resolved: &ResolvedFilter,
    now: DateTime<Utc>,
) -> Result<ExportFile, AuditError> {
    let body = match format {
        ExportFormat::Csv => to_csv(entries)?,
        ExportFormat::Json => to_json(entries, resolved, now)?,
    };
    tracing::info!(format = %format, count = entries.len(), "Audit export rendered");
    Ok(ExportFile {
        filename: export_filename(filter, format, now),
        content_type: format.content_type(),
        body,
    })
}

/// `audit-logs-<range>-<YYYY-MM-DD>.<ext>`
pub fn export_filename(filter: &AuditFilter, format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "audit-logs-{}-{}.{}",
        filter.range_label(),
        now.format("%Y-%m-%d"),
        format.as_str()
    )
}

/// Serialize entries to CSV with a header row.
///
/// Fields containing a comma, quote or newline are quoted with inner quotes
/// doubled. An empty input still yields the header plus one placeholder row.
pub fn to_csv(entries: &[AuditLogEntry]) -> Result<Vec<u8>, AuditError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    if entries.is_empty() {
        let mut filler = vec![String::new(); CSV_COLUMNS.len()];
        filler[0] = EMPTY_EXPORT_MESSAGE.to_string();
        writer.write_record(&filler)?;
    }

    for entry in entries {
        let details = serde_json::to_string(&entry.details)?;
        writer.write_record([
            entry.id.to_string().as_str(),
            entry
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_str(),
            entry.event_type.as_str(),
            entry.user_id.as_str(),
            entry.patient_id.as_deref().unwrap_or(""),
            entry.resource_type.as_str(),
            entry.resource_id.as_deref().unwrap_or(""),
            entry.action.as_str(),
            entry.ip_address.as_deref().unwrap_or(""),
            entry.user_agent.as_deref().unwrap_or(""),
            if entry.success { "Yes" } else { "No" },
            entry.risk_level.as_str(),
            details.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AuditError::Io(e.into_error()))
}

/// Serialize entries to pretty-printed JSON.
pub fn to_json(
    entries: &[AuditLogEntry],
    filters: &ResolvedFilter,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, AuditError> {
    let doc = JsonExport {
        exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        total: entries.len(),
        filters,
        entries,
    };
    Ok(serde_json::to_vec_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TimeRange;
    use crate::test_support::entry;
    use chrono::TimeZone;
    use phiguard_core::AuditEventType;

    #[test]
    fn csv_quotes_commas_and_quotes() {
        let mut e = entry(AuditEventType::DataAccess, "Acme, Inc.");
        e.user_agent = Some(r#"say "hi""#.to_string());
        let csv = String::from_utf8(to_csv(&[e]).unwrap()).unwrap();
        assert!(csv.contains(r#""Acme, Inc.""#));
        assert!(csv.contains(r#""say ""hi""""#));
    }

    #[test]
    fn csv_header_has_fixed_order() {
        let csv = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with(EMPTY_EXPORT_MESSAGE));
        assert!(lines.next().is_none());
    }

    #[test]
    fn success_renders_as_yes_no() {
        let mut e = entry(AuditEventType::FailedAccess, "u");
        e.success = false;
        let body = to_csv(&[e]).unwrap();
        let mut reader = csv::Reader::from_reader(body.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[10], "No");
        assert_eq!(&record[2], "failed_access");
    }

    #[test]
    fn json_export_is_pretty() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let e = entry(AuditEventType::DataAccess, "u");
        let body = to_json(&[e], &ResolvedFilter::default(), now).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("\n  \"total\": 1"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["entries"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn filename_encodes_range_and_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        let filter = AuditFilter {
            time_range: Some(TimeRange::Last24Hours),
            ..Default::default()
        };
        assert_eq!(
            export_filename(&filter, ExportFormat::Csv, now),
            "audit-logs-24h-2026-03-10.csv"
        );
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    }
}
