//! File storage (JSON Lines).
//!
//! The file is an append-only log. A line is either a [`StoredEntry`] or a
//! lifecycle change `{"transition": <id>, "state": <state>}` that applies to
//! an entry written earlier. [`AuditStorage::compact`] folds the changes into
//! the entries and physically drops deleted ones through a temporary file and
//! an atomic rename. Lines this build cannot read are kept verbatim across
//! compactions. An in-memory index serves reads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

use super::{AuditStorage, RecordState, StoredEntry};
use crate::error::AuditError;
use crate::event::AuditLogEntry;
use crate::query::ResolvedFilter;

/// A lifecycle change recorded after the entry it refers to.
#[derive(Debug, Serialize, Deserialize)]
struct StateChange {
    transition: Uuid,
    state: RecordState,
}

enum LogLine {
    Entry(StoredEntry),
    Change(StateChange),
}

impl LogLine {
    fn parse(line: &str) -> Result<Self, serde_json::Error> {
        // Entry lines never carry a `transition` key.
        if let Ok(change) = serde_json::from_str::<StateChange>(line) {
            return Ok(Self::Change(change));
        }
        serde_json::from_str::<StoredEntry>(line).map(Self::Entry)
    }
}

#[derive(Default)]
struct LogState {
    entries: BTreeMap<Uuid, StoredEntry>,
    /// Lines that could not be read, in file order.
    unreadable: Vec<String>,
    /// Change lines not yet folded in by `compact`.
    pending_changes: usize,
}

/// Storage appending to a JSON Lines file.
pub struct FileStorage {
    path: PathBuf,
    state: RwLock<LogState>,
}

impl FileStorage {
    /// Open (or create) the log at `path` and load existing entries.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let state = Self::load(&path)?;
        tracing::info!(
            path = %path.display(),
            count = state.entries.len(),
            unreadable = state.unreadable.len(),
            pending_changes = state.pending_changes,
            "Loaded audit log"
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn load(path: &Path) -> Result<LogState, AuditError> {
        let mut state = LogState::default();
        if !path.exists() {
            return Ok(state);
        }

        let reader = BufReader::new(fs::File::open(path)?);
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match LogLine::parse(trimmed) {
                Ok(LogLine::Entry(stored)) => {
                    state.entries.insert(stored.entry.id, stored);
                }
                Ok(LogLine::Change(change)) if state.entries.contains_key(&change.transition) => {
                    if change.state == RecordState::Deleted {
                        state.entries.remove(&change.transition);
                    } else if let Some(stored) = state.entries.get_mut(&change.transition) {
                        stored.state = change.state;
                    }
                    state.pending_changes += 1;
                }
                Ok(LogLine::Change(_)) => {
                    // Refers to an entry that could not be read; keep it with that entry.
                    state.unreadable.push(trimmed.to_string());
                }
                Err(e) => {
                    tracing::warn!(
                        "Keeping unreadable audit line {} of {} as is: {}",
                        line_num + 1,
                        path.display(),
                        e
                    );
                    state.unreadable.push(trimmed.to_string());
                }
            }
        }
        Ok(state)
    }

    fn append_line(&self, line: &str) -> Result<(), AuditError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::PersistenceFailure(e.to_string()))?;
        writeln!(file, "{}", line).map_err(|e| AuditError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }

    fn lock_error(e: impl std::fmt::Display) -> AuditError {
        AuditError::Storage(format!("Failed to acquire lock: {}", e))
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let stored = StoredEntry {
            entry,
            state: RecordState::Active,
        };
        let json = serde_json::to_string(&stored)?;

        let mut state = self.state.write().map_err(Self::lock_error)?;
        if state.entries.contains_key(&stored.entry.id) {
            return Err(AuditError::PersistenceFailure(format!(
                "duplicate entry id {}",
                stored.entry.id
            )));
        }
        self.append_line(&json)?;
        state.entries.insert(stored.entry.id, stored);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredEntry>, AuditError> {
        let state = self.state.read().map_err(Self::lock_error)?;
        Ok(state.entries.get(&id).cloned())
    }

    async fn find(&self, filter: &ResolvedFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        let state = self.state.read().map_err(Self::lock_error)?;
        Ok(state
            .entries
            .values()
            .filter(|stored| filter.matches(&stored.entry))
            .map(|stored| stored.entry.clone())
            .collect())
    }

    async fn scan(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<StoredEntry>, AuditError> {
        let state = self.state.read().map_err(Self::lock_error)?;
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        Ok(state
            .entries
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
        let mut state = self.state.write().map_err(Self::lock_error)?;
        match state.entries.get(&id) {
            Some(stored) if stored.state == expected => {}
            _ => return Ok(false),
        }

        let change = StateChange {
            transition: id,
            state: next,
        };
        self.append_line(&serde_json::to_string(&change)?)?;

        if next == RecordState::Deleted {
            state.entries.remove(&id);
        } else if let Some(stored) = state.entries.get_mut(&id) {
            stored.state = next;
        }
        state.pending_changes += 1;
        Ok(true)
    }

    async fn count(&self) -> Result<usize, AuditError> {
        Ok(self.state.read().map_err(Self::lock_error)?.entries.len())
    }

    async fn compact(&self) -> Result<(), AuditError> {
        let mut state = self.state.write().map_err(Self::lock_error)?;
        if state.pending_changes == 0 {
            return Ok(());
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for line in &state.unreadable {
                writeln!(file, "{}", line)?;
            }
            for stored in state.entries.values() {
                writeln!(file, "{}", serde_json::to_string(stored)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            folded = state.pending_changes,
            "Compacted audit log"
        );
        state.pending_changes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry;
    use phiguard_core::AuditEventType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");

        let a = entry(AuditEventType::DataAccess, "alice");
        let b = entry(AuditEventType::DataDeletion, "bob");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.append(a.clone()).await.unwrap();
            storage.append(b.clone()).await.unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.count().await.unwrap(), 2);
        assert_eq!(storage.get(a.id).await.unwrap().unwrap().entry, a);
    }

    #[tokio::test]
    async fn transitions_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("audit.log");

        let a = entry(AuditEventType::DataAccess, "alice");
        let b = entry(AuditEventType::DataAccess, "bob");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.append(a.clone()).await.unwrap();
            storage.append(b.clone()).await.unwrap();
            assert!(storage
                .transition(a.id, RecordState::Active, RecordState::Archived)
                .await
                .unwrap());
            assert!(storage
                .transition(b.id, RecordState::Active, RecordState::Deleted)
                .await
                .unwrap());
        }

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.count().await.unwrap(), 1);
        let stored = storage.get(a.id).await.unwrap().unwrap();
        assert_eq!(stored.state, RecordState::Archived);
        assert!(storage.get(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let a = entry(AuditEventType::Logout, "alice");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.append(a.clone()).await.unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn transitions_append_instead_of_rewriting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let a = entry(AuditEventType::DataAccess, "alice");
        let b = entry(AuditEventType::DataAccess, "bob");

        let storage = FileStorage::open(&path).unwrap();
        storage.append(a.clone()).await.unwrap();
        storage.append(b.clone()).await.unwrap();
        let before = lines(&path);

        assert!(storage
            .transition(a.id, RecordState::Active, RecordState::Archived)
            .await
            .unwrap());

        let after = lines(&path);
        assert_eq!(after.len(), 3);
        assert_eq!(&after[..2], &before[..]);
        assert!(after[2].contains(&a.id.to_string()));
        assert!(after[2].contains("archived"));
    }

    #[tokio::test]
    async fn compaction_drops_deleted_entries_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let a = entry(AuditEventType::DataAccess, "alice");
        let b = entry(AuditEventType::DataAccess, "bob");

        let storage = FileStorage::open(&path).unwrap();
        storage.append(a.clone()).await.unwrap();
        storage.append(b.clone()).await.unwrap();
        storage
            .transition(a.id, RecordState::Active, RecordState::Archived)
            .await
            .unwrap();
        storage
            .transition(b.id, RecordState::Active, RecordState::Deleted)
            .await
            .unwrap();
        assert_eq!(lines(&path).len(), 4);

        storage.compact().await.unwrap();

        let compacted = lines(&path);
        assert_eq!(compacted.len(), 1);
        assert!(!compacted[0].contains(&b.id.to_string()));
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert_eq!(
            reopened.get(a.id).await.unwrap().unwrap().state,
            RecordState::Archived
        );
    }

    #[tokio::test]
    async fn unreadable_lines_survive_transition_and_compaction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let a = entry(AuditEventType::DataAccess, "alice");
        let b = entry(AuditEventType::DataAccess, "bob");

        // An entry written by a build that knows more event types.
        let mut foreign = serde_json::to_value(StoredEntry {
            entry: entry(AuditEventType::DataAccess, "carol"),
            state: RecordState::Active,
        })
        .unwrap();
        foreign["entry"]["event_type"] = serde_json::json!("consent_revoked");
        let foreign = serde_json::to_string(&foreign).unwrap();
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.append(a.clone()).await.unwrap();
            storage.append(b.clone()).await.unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", foreign).unwrap();
        drop(file);

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.count().await.unwrap(), 2);
        storage
            .transition(a.id, RecordState::Active, RecordState::Archived)
            .await
            .unwrap();
        storage
            .transition(b.id, RecordState::Active, RecordState::Deleted)
            .await
            .unwrap();
        storage.compact().await.unwrap();

        let compacted = lines(&path);
        assert_eq!(compacted.len(), 2);
        assert!(compacted.contains(&foreign));

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert_eq!(
            reopened.get(a.id).await.unwrap().unwrap().state,
            RecordState::Archived
        );
    }

    #[tokio::test]
    async fn compaction_without_changes_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let storage = FileStorage::open(&path).unwrap();
        storage
            .append(entry(AuditEventType::LoginAttempt, "alice"))
            .await
            .unwrap();
        fs::write(&path, format!("{}\n{{garbage\n", lines(&path)[0])).unwrap();

        let storage = FileStorage::open(&path).unwrap();
        storage.compact().await.unwrap();
        assert_eq!(lines(&path).len(), 2);
    }
}
