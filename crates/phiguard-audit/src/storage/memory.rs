//! In-memory storage.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;
use uuid::Uuid;

use super::{AuditStorage, RecordState, StoredEntry};
use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::query::ResolvedFilter;

/// Storage keeping entries in process memory, ordered by ID.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<Uuid, StoredEntry>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(e: impl std::fmt::Display) -> AuditError {
        AuditError::Storage(format!("Failed to acquire lock: {}", e))
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut entries = self.entries.write().map_err(Self::lock_error)?;
        if entries.contains_key(&entry.id) {
            return Err(AuditError::PersistenceFailure(format!(
                "duplicate entry id {}",
                entry.id
            )));
        }
        entries.insert(
            entry.id,
            StoredEntry {
                entry,
                state: RecordState::Active,
            },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredEntry>, AuditError> {
        let entries = self.entries.read().map_err(Self::lock_error)?;
        Ok(entries.get(&id).cloned())
    }

    async fn find(&self, filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        let entries = self.entries.read().map_err(Self::lock_error)?;
        Ok(entries
            .values()
            .filter(|stored| filter.matches(&stored.entry))
            .map(|stored| stored.entry.clone())
            .collect())
    }

    async fn scan(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<StoredEntry>, AuditError> {
        let entries = self.entries.read().map_err(Self::lock_error)?;
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        Ok(entries
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, stored)| stored.clone())
            .collect())
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
        let mut entries = self.entries.write().map_err(Self::lock_error)?;
        match entries.get_mut(&id) {
            Some(stored) if stored.state == expected => {
                if next == RecordState::Deleted {
                    entries.remove(&id);
                } else {
                    stored.state = next;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> Result<usize, AuditError> {
        Ok(self.entries.read().map_err(Self::lock_error)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;
    use phiguard_core::AuditEventType;

    #[tokio::test]
    async fn test_memory_storage_query() {
        let storage = MemoryStorage::new();
        let mut a = entry(AuditEventType::DataAccess, "alice");
        a.resource_type = "lab_reports".to_string();
        let b = entry(AuditEventType::DataAccess, "bob");

        storage.append(a.clone()).await.unwrap();
        storage.append(b).await.unwrap();

        let filter = ResolvedFilter {
            user_id: Some("alice".to_string()),
            ..Default::default()
        };
        let results = storage.find(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, a.id);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let storage = MemoryStorage::new();
        let a = entry(AuditEventType::DataAccess, "alice");
        storage.append(a.clone()).await.unwrap();
        assert!(matches!(
            storage.append(a).await,
            Err(AuditError::PersistenceFailure(_))
        ));
    }

    #[tokio::test]
    async fn scan_is_resumable() {
        let storage = MemoryStorage::new();
        for i in 0..7 {
            storage
                .append(entry(AuditEventType::ApiRequest, &format!("u{}", i)))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let batch = storage.scan(cursor, 3).await.unwrap();
            if batch.is_empty() {
                break;
            }
            cursor = batch.last().map(|s| s.entry.id);
            seen.extend(batch.into_iter().map(|s| s.entry.id));
        }
        assert_eq!(seen.len(), 7);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[tokio::test]
    async fn transition_is_guarded_by_current_state() {
        let storage = MemoryStorage::new();
        let a = entry(AuditEventType::DataAccess, "alice");
        storage.append(a.clone()).await.unwrap();

        assert!(storage
            .transition(a.id, RecordState::Active, RecordState::Archived)
            .await
            .unwrap());
        // A second archiver loses the race.
        assert!(!storage
            .transition(a.id, RecordState::Active, RecordState::Archived)
            .await
            .unwrap());
        // Backward moves are refused.
        assert!(!storage
            .transition(a.id, RecordState::Archived, RecordState::Active)
            .await
            .unwrap());

        assert!(storage
            .transition(a.id, RecordState::Archived, RecordState::Deleted)
            .await
            .unwrap());
        assert!(storage.get(a.id).await.unwrap().is_none());
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
