//! Exhaustive cosine-similarity vector backend.
//!
//! Scores every stored embedding against the query. The ANN tuning
//! parameters are carried as configuration so an HNSW-backed implementation
//! can take their place behind the same contract; here they do not affect
//! result order.

use super::similarity::cosine_similarity;
use crate::config::VectorSettings;
use crate::models::{MemoryFilter, MemoryId, MemoryRecord, ScoredMemory};
use crate::storage::traits::MemoryBackend;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

/// Fixed-dimension vector backend.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::{MemoryBackend, MemoryRecord, VectorBackend};
///
/// let backend = VectorBackend::new(2);
/// backend.store(MemoryRecord::new("a", "agent", "note", "x").with_embedding(vec![1.0, 0.0]))?;
/// backend.store(MemoryRecord::new("b", "agent", "note", "y").with_embedding(vec![0.0, 1.0]))?;
///
/// let hits = backend.vector_search(&[0.9, 0.1], 1)?;
/// assert_eq!(hits[0].memory.id.as_str(), "a");
/// # Ok::<(), guardian_cognition::Error>(())
/// ```
#[derive(Debug)]
pub struct VectorBackend {
    settings: VectorSettings,
    records: RwLock<HashMap<MemoryId, MemoryRecord>>,
}

impl Default for VectorBackend {
    fn default() -> Self {
        Self::with_settings(VectorSettings::default())
    }
}

impl VectorBackend {
    /// Creates a backend with the given dimensionality and default tuning.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self::with_settings(VectorSettings {
            dimensions,
            ..VectorSettings::default()
        })
    }

    /// Creates a backend from full settings.
    #[must_use]
    pub fn with_settings(settings: VectorSettings) -> Self {
        Self {
            settings,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Configured embedding dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.settings.dimensions
    }

    /// HNSW graph degree.
    #[must_use]
    pub const fn hnsw_m(&self) -> usize {
        self.settings.hnsw_m
    }

    /// HNSW construction beam width.
    #[must_use]
    pub const fn ef_construction(&self) -> usize {
        self.settings.ef_construction
    }

    /// HNSW search beam width.
    #[must_use]
    pub const fn ef_search(&self) -> usize {
        self.settings.ef_search
    }

    /// Returns true if `id` is indexed.
    pub fn contains(&self, id: &MemoryId) -> Result<bool> {
        Ok(self.read("vector_contains")?.contains_key(id))
    }

    /// Checks that `record` carries an embedding of the configured length.
    pub fn validate(&self, record: &MemoryRecord) -> Result<()> {
        let Some(embedding) = record.embedding.as_deref() else {
            return Err(Error::InvalidInput(format!(
                "memory '{}' has no embedding; the vector backend requires one",
                record.id
            )));
        };
        if embedding.is_empty() {
            return Err(Error::InvalidInput(format!(
                "memory '{}' has an empty embedding",
                record.id
            )));
        }
        if embedding.len() != self.settings.dimensions {
            return Err(Error::InvalidInput(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.settings.dimensions,
                embedding.len()
            )));
        }
        Ok(())
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, HashMap<MemoryId, MemoryRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::lock_poisoned(operation))
    }

    fn write(
        &self,
        operation: &str,
    ) -> Result<RwLockWriteGuard<'_, HashMap<MemoryId, MemoryRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::lock_poisoned(operation))
    }

    /// Ranks every indexed record against `embedding`, best first.
    ///
    /// Ties are broken by id so results are deterministic.
    pub fn rank_all(&self, embedding: &[f32]) -> Result<Vec<ScoredMemory>> {
        let records = self.read("vector_search")?;
        let mut scored: Vec<ScoredMemory> = records
            .values()
            .filter_map(|record| {
                let stored = record.embedding.as_deref()?;
                Some(ScoredMemory {
                    similarity: cosine_similarity(embedding, stored),
                    memory: record.clone(),
                })
            })
            .collect();
        drop(records);

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        Ok(scored)
    }
}

impl MemoryBackend for VectorBackend {
    fn store(&self, record: MemoryRecord) -> Result<()> {
        self.validate(&record)?;
        tracing::debug!(id = %record.id, "vector store");
        metrics::counter!("vector_store_total").increment(1);
        self.write("vector_store")?.insert(record.id.clone(), record);
        Ok(())
    }

    fn retrieve(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        Ok(self.read("vector_retrieve")?.get(id).cloned())
    }

    fn update(&self, record: MemoryRecord) -> Result<bool> {
        let mut records = self.write("vector_update")?;
        let Some(existing) = records.get_mut(&record.id) else {
            return Ok(false);
        };
        self.validate(&record)?;
        *existing = record;
        Ok(true)
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        Ok(self.write("vector_delete")?.remove(id).is_some())
    }

    fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>> {
        let records = self.read("vector_query")?;
        let mut matches: Vec<MemoryRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        drop(records);

        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(matches
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn vector_search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredMemory>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        metrics::counter!("vector_search_total").increment(1);
        let mut ranked = self.rank_all(embedding)?;
        ranked.truncate(k);
        Ok(ranked)
    }

    #[instrument(name = "guardian_cognition.vector.clear_agent", skip(self))]
    fn clear_agent(&self, agent_id: &str) -> Result<usize> {
        let mut records = self.write("vector_clear_agent")?;
        let before = records.len();
        records.retain(|_, r| r.agent_id != agent_id);
        Ok(before - records.len())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read("vector_count")?.len())
    }

    fn close(&self) -> Result<()> {
        self.write("vector_close")?.clear();
        Ok(())
    }
}
