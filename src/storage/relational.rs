//! In-memory relational backend.
//!
//! Exact and range filtering over records keyed by id. Has no vector
//! capability: [`MemoryBackend::vector_search`] returns an empty list.

use crate::models::{MemoryFilter, MemoryId, MemoryRecord, ScoredMemory};
use crate::storage::traits::MemoryBackend;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

#[derive(Debug)]
struct Entry {
    record: MemoryRecord,
    /// Insertion order, kept across overwrites; breaks timestamp ties.
    seq: u64,
}

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<MemoryId, Entry>,
    next_seq: u64,
}

/// Relational memory backend.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::{MemoryBackend, MemoryFilter, MemoryRecord, RelationalBackend};
///
/// let backend = RelationalBackend::new();
/// backend.store(MemoryRecord::new("m1", "agent-a", "note", "hello"))?;
/// let found = backend.query(&MemoryFilter::new().with_agent("agent-a"))?;
/// assert_eq!(found.len(), 1);
/// # Ok::<(), guardian_cognition::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct RelationalBackend {
    tables: RwLock<Tables>,
}

impl RelationalBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| Error::lock_poisoned(operation))
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| Error::lock_poisoned(operation))
    }

    /// Returns every record owned by `agent_id`, newest first.
    pub fn memories_by_agent(&self, agent_id: &str) -> Result<Vec<MemoryRecord>> {
        self.query(&MemoryFilter::new().with_agent(agent_id))
    }

    /// Returns a snapshot of every record in insertion order.
    pub fn all(&self) -> Result<Vec<MemoryRecord>> {
        let tables = self.read("relational_all")?;
        let mut entries: Vec<&Entry> = tables.records.values().collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries.into_iter().map(|e| e.record.clone()).collect())
    }

    /// Stores or restores a record, keeping the slot of an existing id.
    pub(crate) fn put(&self, record: MemoryRecord) -> Result<Option<MemoryRecord>> {
        let mut tables = self.write("relational_store")?;
        let id = record.id.clone();
        if let Some(entry) = tables.records.get_mut(&id) {
            return Ok(Some(std::mem::replace(&mut entry.record, record)));
        }
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.records.insert(id, Entry { record, seq });
        Ok(None)
    }
}

impl MemoryBackend for RelationalBackend {
    fn store(&self, record: MemoryRecord) -> Result<()> {
        tracing::debug!(id = %record.id, agent_id = %record.agent_id, "relational store");
        metrics::counter!("relational_store_total").increment(1);
        self.put(record).map(|_| ())
    }

    fn retrieve(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        let tables = self.read("relational_retrieve")?;
        Ok(tables.records.get(id).map(|e| e.record.clone()))
    }

    fn update(&self, record: MemoryRecord) -> Result<bool> {
        let mut tables = self.write("relational_update")?;
        match tables.records.get_mut(&record.id) {
            Some(entry) => {
                entry.record = record;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        let mut tables = self.write("relational_delete")?;
        Ok(tables.records.remove(id).is_some())
    }

    fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>> {
        let tables = self.read("relational_query")?;

        let mut matches: Vec<&Entry> = tables
            .records
            .values()
            .filter(|e| filter.matches(&e.record))
            .collect();
        // Relevance has no relational meaning and keeps timestamp order.
        matches.sort_by(|a, b| {
            b.record
                .timestamp
                .cmp(&a.record.timestamp)
                .then(a.seq.cmp(&b.seq))
        });

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|e| e.record.clone())
            .collect())
    }

    fn vector_search(&self, _embedding: &[f32], _k: usize) -> Result<Vec<ScoredMemory>> {
        Ok(Vec::new())
    }

    #[instrument(name = "guardian_cognition.relational.clear_agent", skip(self))]
    fn clear_agent(&self, agent_id: &str) -> Result<usize> {
        let mut tables = self.write("relational_clear_agent")?;
        let before = tables.records.len();
        tables.records.retain(|_, e| e.record.agent_id != agent_id);
        let removed = before - tables.records.len();
        tracing::debug!(removed, "cleared agent records");
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read("relational_count")?.records.len())
    }

    fn close(&self) -> Result<()> {
        let mut tables = self.write("relational_close")?;
        tables.records.clear();
        tables.next_seq = 0;
        Ok(())
    }
}
