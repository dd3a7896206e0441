//! Audit storage backends.
//!
//! The hot store holds the append-only audit trail. Entries are never updated;
//! the only mutation is the lifecycle transition driven by the retention
//! engine (`active -> archived -> deleted`, or `active -> deleted`), guarded
//! by compare-and-set on the current state so concurrent sweeps cannot both
//! act on the same record.
//!
//! The cold store receives archived copies and is write-once.

mod cold;
mod file;
mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use phiguard_core::{AuditConfig, StorageBackend};

use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::query::ResolvedFilter;

pub use cold::{FileColdStore, MemoryColdStore};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Lifecycle state of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Active,
    Archived,
    /// Terminal. Deleted entries are removed from the store.
    Deleted,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: RecordState) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Archived) | (Self::Active, Self::Deleted) | (Self::Archived, Self::Deleted)
        )
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry together with its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry: AuditLogEntry,
    pub state: RecordState,
}

/// Trait for audit storage backends.
///
/// `append` must be safe under concurrent invocation; the engine adds no
/// locking of its own around it.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Append a new entry in the `active` state.
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError>;

    /// Get an entry by ID.
    async fn get(&self, id: Uuid) -> Result<Option<StoredEntry>, AuditError>;

    /// All entries matching a filter, unordered and unpaged.
    async fn find(&self, filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError>;

    /// Current lifecycle state of an entry, `None` once deleted or never written.
    async fn state(&self, id: Uuid) -> Result<Option<RecordState>, AuditError> {
        Ok(self.get(id).await?.map(|stored| stored.state))
    }

    /// Up to `limit` entries with IDs strictly greater than `after`, ordered by ID.
    async fn scan(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<StoredEntry>, AuditError>;

    /// Move an entry from `expected` to `next`. Returns `false` without
    /// changing anything when the entry is missing or not in `expected`.
    /// Moving to [`RecordState::Deleted`] removes the entry.
    async fn transition(
        &self,
        id: Uuid,
        expected: RecordState,
        next: RecordState,
    ) -> Result<bool, AuditError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, AuditError>;

    /// Fold recorded lifecycle changes into the stored data, physically
    /// dropping deleted entries. Backends that apply transitions in place
    /// need not override this.
    async fn compact(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Outcome of handing an entry to the cold store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Stored,
    AlreadyArchived,
}

/// Write-once archive for entries nearing expiry.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Archive an entry, preserving its ID. Archiving the same ID twice is a no-op.
    async fn archive(&self, entry: &AuditLogEntry) -> Result<ArchiveOutcome, AuditError>;

    /// Whether an entry with this ID has been archived.
    async fn contains(&self, id: Uuid) -> Result<bool, AuditError>;
}

/// Create the hot store described by configuration.
pub async fn create_storage(config: &AuditConfig) -> Result<Arc<dyn AuditStorage>, AuditError> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::File => {
            let path = config
                .storage
                .file_path
                .as_deref()
                .unwrap_or("audit.log");
            Ok(Arc::new(FileStorage::open(path)?))
        }
        StorageBackend::Database => {
            let url = config.storage.resolve_database_url().ok_or_else(|| {
                AuditError::Storage("database backend selected but no database_url set".to_string())
            })?;
            let storage = PostgresStorage::connect(&url).await?;
            storage.migrate().await?;
            Ok(Arc::new(storage))
        }
    }
}

/// Create the cold store described by configuration.
pub fn create_cold_store(config: &AuditConfig) -> Result<Arc<dyn ColdStore>, AuditError> {
    match config.cold_store_path.as_deref() {
        Some(path) => Ok(Arc::new(FileColdStore::open(path)?)),
        None => {
            tracing::warn!("No cold_store_path configured, archives are kept in memory");
            Ok(Arc::new(MemoryColdStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_never_moves_backward() {
        use RecordState::*;
        assert!(Active.can_transition_to(Archived));
        assert!(Active.can_transition_to(Deleted));
        assert!(Archived.can_transition_to(Deleted));
        assert!(!Archived.can_transition_to(Active));
        assert!(!Deleted.can_transition_to(Active));
        assert!(!Deleted.can_transition_to(Archived));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn state_parses_its_own_name() {
        for s in [RecordState::Active, RecordState::Archived, RecordState::Deleted] {
            assert_eq!(RecordState::parse(s.as_str()), Some(s));
        }
        assert_eq!(RecordState::parse("gone"), None);
    }
}
