//! Cold stores for archived entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{ArchiveOutcome, ColdStore};
use crate::error::AuditError;
use crate::event::AuditLogEntry;

#[derive(Debug, Serialize, Deserialize)]
struct ArchivedRecord {
    archived_at: DateTime<Utc>,
    entry: AuditLogEntry,
}

/// Write-once JSON Lines archive.
pub struct FileColdStore {
    path: PathBuf,
    ids: Mutex<HashSet<Uuid>>,
}

impl FileColdStore {
    /// Open (or create) the archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut ids = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(fs::File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ArchivedRecord>(&line) {
                    Ok(record) => {
                        ids.insert(record.entry.id);
                    }
                    Err(e) => tracing::warn!("Skipping unreadable archive line: {}", e),
                }
            }
        }

        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }
}

#[async_trait]
impl ColdStore for FileColdStore {
    async fn archive(&self, entry: &AuditLogEntry) -> Result<ArchiveOutcome, AuditError> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire lock: {}", e)))?;
        if ids.contains(&entry.id) {
            return Ok(ArchiveOutcome::AlreadyArchived);
        }

        let record = ArchivedRecord {
            archived_at: Utc::now(),
            entry: entry.clone(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        file.sync_data()?;

        ids.insert(entry.id);
        Ok(ArchiveOutcome::Stored)
    }

    async fn contains(&self, id: Uuid) -> Result<bool, AuditError> {
        let ids = self
            .ids
            .lock()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire lock: {}", e)))?;
        Ok(ids.contains(&id))
    }
}

/// In-memory archive.
#[derive(Debug, Default)]
pub struct MemoryColdStore {
    entries: RwLock<BTreeMap<Uuid, AuditLogEntry>>,
}

impl MemoryColdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archived entries, ordered by ID.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ColdStore for MemoryColdStore {
    async fn archive(&self, entry: &AuditLogEntry) -> Result<ArchiveOutcome, AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire lock: {}", e)))?;
        if entries.contains_key(&entry.id) {
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
        entries.insert(entry.id, entry.clone());
        Ok(ArchiveOutcome::Stored)
    }

    async fn contains(&self, id: Uuid) -> Result<bool, AuditError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire lock: {}", e)))?;
        Ok(entries.contains_key(&id))
    }
}
