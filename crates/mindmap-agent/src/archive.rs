//! Saved maps, newest first, kept as one JSON array under one storage key.
//!
//! Every operation reloads from storage before returning, so callers only ever see
//! what was durably written. A failed write hands back the list as it was before the
//! operation.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use mindmap_core::{ArchiveEntry, MapNode};

use crate::storage::KvStore;

pub const DEFAULT_KEY: &str = "mindmap_archive";

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct ArchiveStore<S, C = SystemClock> {
    store: S,
    clock: C,
    key: String,
}

impl<S: KvStore> ArchiveStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self::with_clock(store, key, SystemClock)
    }
}

impl<S: KvStore, C: Clock> ArchiveStore<S, C> {
    pub fn with_clock(store: S, key: impl Into<String>, clock: C) -> Self {
        Self {
            store,
            clock,
            key: key.into(),
        }
    }

    /// All entries sorted by `id` descending. Unreadable storage reads as empty.
    pub fn list(&self) -> Vec<ArchiveEntry> {
        self.load_sorted().unwrap_or_else(|err| {
            tracing::warn!(
                key = %self.key,
                error = ?err,
                "failed to load archive, treating as empty"
            );
            Vec::new()
        })
    }

    pub fn get(&self, id: i64) -> Option<ArchiveEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// An archive that cannot be read is never overwritten; the save is dropped.
    pub fn save(&mut self, file_name: &str, tree: &MapNode) -> Vec<ArchiveEntry> {
        let before = match self.load_sorted() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(
                    file_name,
                    error = ?err,
                    "archive is unreadable, not saving over it"
                );
                return Vec::new();
            }
        };
        let now = self.clock.now();
        let entry = ArchiveEntry {
            id: now.timestamp_millis(),
            file_name: file_name.to_string(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            mind_map_data: tree.clone(),
        };
        let id = entry.id;

        let mut next = Vec::with_capacity(before.len() + 1);
        next.push(entry);
        next.extend(before.iter().cloned());

        if let Err(err) = self.persist(&next) {
            tracing::error!(
                id,
                file_name,
                error = ?err,
                "failed to archive map, keeping previous list"
            );
            return before;
        }
        tracing::info!(id, file_name, entries = next.len(), "map archived");
        self.list()
    }

    /// Removes the entry with `id`; an unknown id leaves the list as it was.
    pub fn delete(&mut self, id: i64) -> Vec<ArchiveEntry> {
        let before = match self.load_sorted() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(id, error = ?err, "archive is unreadable, not deleting from it");
                return Vec::new();
            }
        };
        let next: Vec<ArchiveEntry> = before.iter().filter(|e| e.id != id).cloned().collect();
        if next.len() == before.len() {
            tracing::debug!(id, "no archived map with this id");
        }

        if let Err(err) = self.persist(&next) {
            tracing::error!(
                id,
                error = ?err,
                "failed to delete archived map, keeping previous list"
            );
            return before;
        }
        tracing::info!(id, entries = next.len(), "archived map deleted");
        self.list()
    }

    fn load_sorted(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = self.load()?;
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    fn load(&self) -> Result<Vec<ArchiveEntry>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).context("archive blob is not a list of entries")
    }

    fn persist(&mut self, entries: &[ArchiveEntry]) -> Result<()> {
        let blob = serde_json::to_string(entries).context("failed to serialize archive")?;
        self.store.set(&self.key, &blob)
    }
}
