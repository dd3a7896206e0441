//! Postgres storage.
//!
//! One append-only table. The full entry is kept as `jsonb`; the columns the
//! query filters hit most are duplicated next to it so they can be indexed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Arguments, PgPool, Row};
use uuid::Uuid;

use super::{AuditStorage, RecordState, StoredEntry};
use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::query::ResolvedFilter;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS audit_log_entries (
        id UUID PRIMARY KEY,
        "timestamp" TIMESTAMPTZ NOT NULL,
        event_type TEXT NOT NULL,
        user_id TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        risk_level TEXT NOT NULL,
        success BOOLEAN NOT NULL,
        state TEXT NOT NULL DEFAULT 'active',
        entry JSONB NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS audit_log_entries_user_ts
        ON audit_log_entries (user_id, "timestamp")"#,
    r#"CREATE INDEX IF NOT EXISTS audit_log_entries_risk_ts
        ON audit_log_entries (risk_level, "timestamp")"#,
    r#"CREATE INDEX IF NOT EXISTS audit_log_entries_resource_ts
        ON audit_log_entries (resource_type, "timestamp")"#,
];

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), AuditError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| AuditError::Storage(e.to_string()))
}

/// A bind parameter for [`select_sql`], in placeholder order.
#[derive(Debug, Clone, PartialEq)]
enum Param {
    Text(String),
    Bool(bool),
    Time(DateTime<Utc>),
}

/// Build the indexed part of a filtered select. Placeholders are numbered in
/// the order the parameters are returned.
fn select_sql(filter: &ResolvedFilter) -> (String, Vec<Param>) {
    let mut where_parts = Vec::new();
    let mut params = Vec::new();
    let mut push = |column: &str, op: &str, param: Param| {
        params.push(param);
        where_parts.push(format!("{} {} ${}", column, op, params.len()));
    };

    if let Some(user_id) = &filter.user_id {
        push("user_id", "=", Param::Text(user_id.clone()));
    }
    if let Some(resource_type) = &filter.resource_type {
        push("resource_type", "=", Param::Text(resource_type.clone()));
    }
    if let Some(risk_level) = filter.risk_level {
        push("risk_level", "=", Param::Text(risk_level.as_str().to_string()));
    }
    if let Some(event_type) = filter.event_type {
        push("event_type", "=", Param::Text(event_type.as_str().to_string()));
    }
    if let Some(success) = filter.success {
        push("success", "=", Param::Bool(success));
    }
    if let Some(start) = filter.start {
        push("\"timestamp\"", ">=", Param::Time(start));
    }
    if let Some(end) = filter.end {
        push("\"timestamp\"", "<=", Param::Time(end));
    }

    let sql = if where_parts.is_empty() {
        "SELECT entry, state FROM audit_log_entries".to_string()
    } else {
        format!(
            "SELECT entry, state FROM audit_log_entries WHERE {}",
            where_parts.join(" AND ")
        )
    };
    (sql, params)
}

/// Guarded statement for a lifecycle move: `$1` is the id, `$2` the expected
/// state and, unless the entry is being deleted, `$3` the next state.
fn transition_sql(next: RecordState) -> &'static str {
    match next {
        RecordState::Deleted => "DELETE FROM audit_log_entries WHERE id = $1 AND state = $2",
        _ => "UPDATE audit_log_entries SET state = $3 WHERE id = $1 AND state = $2",
    }
}

/// Storage backed by a Postgres table.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to the database.
    pub async fn connect(database_url: &str) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the table and indexes if they don't exist.
    pub async fn migrate(&self) -> Result<(), AuditError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("audit_log_entries schema ready");
        Ok(())
    }

    fn decode(row: &PgRow) -> Result<StoredEntry, AuditError> {
        let entry: serde_json::Value = row.try_get("entry")?;
        let state: String = row.try_get("state")?;
        let state = RecordState::parse(&state)
            .ok_or_else(|| AuditError::Storage(format!("unknown record state '{}'", state)))?;
        Ok(StoredEntry {
            entry: serde_json::from_value(entry)?,
            state,
        })
    }
}

#[async_trait]
impl AuditStorage for PostgresStorage {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let payload = serde_json::to_value(&entry)?;
        sqlx::query(
            r#"INSERT INTO audit_log_entries
                (id, "timestamp", event_type, user_id, resource_type, risk_level, success, entry)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(entry.event_type.as_str())
        .bind(&entry.user_id)
        .bind(&entry.resource_type)
        .bind(entry.risk_level.as_str())
        .bind(entry.success)
        .bind(sqlx::types::Json(payload))
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredEntry>, AuditError> {
        let row = sqlx::query("SELECT entry, state FROM audit_log_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find(&self, filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        // Indexed columns narrow the scan; the remaining predicates run on the
        // decoded entries.
        let (sql, params) = select_sql(filter);
        let mut args = PgArguments::default();
        for param in params {
            match param {
                Param::Text(v) => args_add(&mut args, v)?,
                Param::Bool(v) => args_add(&mut args, v)?,
                Param::Time(v) => args_add(&mut args, v)?,
            }
        }

        let rows = sqlx::query_with(&sql, args).fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let stored = Self::decode(row)?;
            if filter.matches(&stored.entry) {
                entries.push(stored.entry);
            }
        }
        Ok(entries)
    }

    async fn scan(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<StoredEntry>, AuditError> {
        let rows = sqlx::query(
            "SELECT entry, state FROM audit_log_entries
             WHERE ($1::uuid IS NULL OR id > $1)
             ORDER BY id
             LIMIT $2",
        )
        .bind(after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: RecordState,
        next: RecordState,
    ) -> Result<bool, AuditError> {
        if !expected.can_transition_to(next) {
            return Ok(false);
        }
        let mut query = sqlx::query(transition_sql(next))
            .bind(id)
            .bind(expected.as_str());
        if next != RecordState::Deleted {
            query = query.bind(next.as_str());
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn count(&self) -> Result<usize, AuditError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
