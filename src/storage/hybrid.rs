//! Hybrid backend: one relational store plus one vector index.
//!
//! The relational side is the source of truth and holds every record. The
//! vector side holds the subset of records with a usable embedding, keyed by
//! the same id.
//!
//! # Hybrid Search
//!
//! With a query embedding, the entire vector index is ranked first and the
//! relational predicates are applied to the ranked list before truncating to
//! `k`. Filtering a top-k list instead would under-fill results whenever the
//! predicates are selective.

use super::relational::RelationalBackend;
use super::traits::MemoryBackend;
use super::vector::VectorBackend;
use crate::Result;
use crate::config::VectorSettings;
use crate::models::{
    HybridQuery, MemoryFilter, MemoryId, MemoryRecord, MemoryStats, ScoredMemory,
};
use tracing::instrument;

/// Dual-write composition of [`RelationalBackend`] and [`VectorBackend`].
#[derive(Debug, Default)]
pub struct HybridBackend {
    relational: RelationalBackend,
    vector: VectorBackend,
}

impl HybridBackend {
    /// Creates a hybrid backend with a vector index of the given settings.
    #[must_use]
    pub fn new(settings: VectorSettings) -> Self {
        Self::from_parts(RelationalBackend::new(), VectorBackend::with_settings(settings))
    }

    /// Composes existing backends.
    #[must_use]
    pub const fn from_parts(relational: RelationalBackend, vector: VectorBackend) -> Self {
        Self { relational, vector }
    }

    /// The relational side.
    #[must_use]
    pub const fn relational(&self) -> &RelationalBackend {
        &self.relational
    }

    /// The vector side.
    #[must_use]
    pub const fn vector(&self) -> &VectorBackend {
        &self.vector
    }

    /// Filter-and-rank search.
    ///
    /// Without an embedding this is [`MemoryBackend::query`] capped at `k`,
    /// with every similarity reported as `1.0`. On both paths the filter's
    /// `offset` skips matches and its `limit` caps them before `k` applies.
    pub fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<ScoredMemory>> {
        metrics::counter!("hybrid_search_total").increment(1);

        let Some(embedding) = query.embedding.as_deref() else {
            let records = self.relational.query(&query.filter)?;
            return Ok(records
                .into_iter()
                .take(query.k)
                .map(|memory| ScoredMemory {
                    memory,
                    similarity: 1.0,
                })
                .collect());
        };

        // The relational side is the source of truth for the returned record.
        let ranked = self.vector.rank_all(embedding)?;
        let cap = query.k.min(query.filter.limit.unwrap_or(usize::MAX));
        let mut skip = query.filter.offset.unwrap_or(0);
        let mut results = Vec::with_capacity(cap.min(ranked.len()));
        for hit in ranked {
            if results.len() == cap {
                break;
            }
            let Some(memory) = self.relational.retrieve(&hit.memory.id)? else {
                continue;
            };
            if !query.filter.matches(&memory) {
                continue;
            }
            if skip > 0 {
                skip -= 1;
            } else {
                results.push(ScoredMemory {
                    memory,
                    similarity: hit.similarity,
                });
            }
        }
        Ok(results)
    }

    /// Aggregate statistics over every record.
    pub fn stats(&self) -> Result<MemoryStats> {
        self.collect_stats(self.relational.all()?)
    }

    /// Aggregate statistics over one owning namespace.
    pub fn stats_for_agent(&self, agent_id: &str) -> Result<MemoryStats> {
        self.collect_stats(self.relational.memories_by_agent(agent_id)?)
    }

    fn collect_stats(&self, records: Vec<MemoryRecord>) -> Result<MemoryStats> {
        let mut stats = MemoryStats {
            total_memories: records.len(),
            ..MemoryStats::default()
        };
        for record in records {
            if self.vector.contains(&record.id)? {
                stats.vectorized += 1;
            }
            *stats.by_agent.entry(record.agent_id).or_insert(0) += 1;
            *stats.by_type.entry(record.memory_type).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

impl MemoryBackend for HybridBackend {
    fn store(&self, record: MemoryRecord) -> Result<()> {
        let vectorize = record.usable_embedding().is_some();
        if vectorize {
            self.vector.validate(&record)?;
        }

        let id = record.id.clone();
        let vector_copy = vectorize.then(|| record.clone());
        let previous = self.relational.put(record)?;

        let vector_result = match vector_copy {
            Some(copy) => self.vector.store(copy),
            None => self.vector.delete(&id).map(|_| ()),
        };
        if let Err(err) = vector_result {
            // Roll the relational side back so no half-written record is visible.
            match previous {
                Some(prev) => {
                    self.relational.put(prev)?;
                },
                None => {
                    self.relational.delete(&id)?;
                },
            }
            tracing::warn!(id = %id, error = %err, "hybrid store rolled back");
            return Err(err);
        }

        metrics::counter!("memory_store_total", "vectorized" => vectorize.to_string())
            .increment(1);
        Ok(())
    }

    fn retrieve(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        self.relational.retrieve(id)
    }

    fn update(&self, record: MemoryRecord) -> Result<bool> {
        let vectorize = record.usable_embedding().is_some();
        if vectorize {
            self.vector.validate(&record)?;
        }
        let id = record.id.clone();
        let vector_copy = vectorize.then(|| record.clone());

        if !self.relational.update(record)? {
            return Ok(false);
        }
        match vector_copy {
            Some(copy) => self.vector.store(copy)?,
            None => {
                self.vector.delete(&id)?;
            },
        }
        Ok(true)
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        let removed = self.relational.delete(id)?;
        self.vector.delete(id)?;
        Ok(removed)
    }

    fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>> {
        self.relational.query(filter)
    }

    fn vector_search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredMemory>> {
        self.vector.vector_search(embedding, k)
    }

    #[instrument(name = "guardian_cognition.hybrid.clear_agent", skip(self))]
    fn clear_agent(&self, agent_id: &str) -> Result<usize> {
        let removed = self.relational.clear_agent(agent_id)?;
        self.vector.clear_agent(agent_id)?;
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        self.relational.count()
    }

    fn close(&self) -> Result<()> {
        self.relational.close()?;
        self.vector.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HybridBackend {
        HybridBackend::new(VectorSettings {
            dimensions: 2,
            ..VectorSettings::default()
        })
    }

    fn record(id: &str, agent: &str, ts: u64) -> MemoryRecord {
        MemoryRecord::new(id, agent, "note", id).with_timestamp(ts)
    }

    #[test]
    fn test_store_with_and_without_embedding() {
        let hybrid = backend();
        hybrid
            .store(record("v", "a", 1).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        hybrid.store(record("plain", "a", 2)).unwrap();

        assert_eq!(hybrid.count().unwrap(), 2);
        assert_eq!(hybrid.vector().count().unwrap(), 1);
        assert!(hybrid.retrieve(&MemoryId::new("plain")).unwrap().is_some());
        assert_eq!(hybrid.vector_search(&[1.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn test_store_is_all_or_nothing() {
        let hybrid = backend();
        let bad = record("bad", "a", 1).with_embedding(vec![1.0, 0.0, 0.0]);
        assert!(hybrid.store(bad).is_err());
        assert!(hybrid.retrieve(&MemoryId::new("bad")).unwrap().is_none());
        assert_eq!(hybrid.count().unwrap(), 0);
    }

    #[test]
    fn test_overwrite_without_embedding_leaves_index() {
        let hybrid = backend();
        hybrid
            .store(record("m", "a", 1).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        hybrid.store(record("m", "a", 2)).unwrap();
        assert!(!hybrid.vector().contains(&MemoryId::new("m")).unwrap());
    }

    #[test]
    fn test_update_reindexes() {
        let hybrid = backend();
        hybrid.store(record("m", "a", 1)).unwrap();
        assert!(
            hybrid
                .update(record("m", "a", 1).with_embedding(vec![0.0, 1.0]))
                .unwrap()
        );
        assert!(hybrid.vector().contains(&MemoryId::new("m")).unwrap());

        assert!(hybrid.update(record("m", "a", 1)).unwrap());
        assert!(!hybrid.vector().contains(&MemoryId::new("m")).unwrap());

        assert!(!hybrid.update(record("ghost", "a", 1)).unwrap());
        assert!(!hybrid.vector().contains(&MemoryId::new("ghost")).unwrap());
    }

    #[test]
    fn test_delete_mirrors_into_vector() {
        let hybrid = backend();
        hybrid
            .store(record("m", "a", 1).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        assert!(hybrid.delete(&MemoryId::new("m")).unwrap());
        assert_eq!(hybrid.vector().count().unwrap(), 0);
        assert!(!hybrid.delete(&MemoryId::new("m")).unwrap());
    }

    #[test]
    fn test_hybrid_search_without_embedding_reports_unit_similarity() {
        let hybrid = backend();
        for i in 0..4 {
            hybrid.store(record(&format!("m{i}"), "a", i)).unwrap();
        }
        let results = hybrid
            .hybrid_search(&HybridQuery::new(MemoryFilter::new().with_agent("a")).with_k(3))
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| (r.similarity - 1.0).abs() < f32::EPSILON));
        assert_eq!(results[0].memory.id.as_str(), "m3");
    }

    #[test]
    fn test_hybrid_search_filters_after_ranking() {
        let hybrid = backend();
        // Ten strong matches owned by "noise", two weak matches owned by "target".
        for i in 0..10 {
            hybrid
                .store(record(&format!("noise{i}"), "noise", 1).with_embedding(vec![1.0, 0.0]))
                .unwrap();
        }
        hybrid
            .store(record("t1", "target", 1).with_embedding(vec![0.5, 0.5]))
            .unwrap();
        hybrid
            .store(record("t2", "target", 1).with_embedding(vec![0.0, 1.0]))
            .unwrap();

        let query = HybridQuery::new(MemoryFilter::new().with_agent("target"))
            .with_embedding(vec![1.0, 0.0])
            .with_k(2);
        let results = hybrid.hybrid_search(&query).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn test_hybrid_search_paginates_on_both_paths() {
        let hybrid = backend();
        for i in 0u64..5 {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f32;
            hybrid
                .store(record(&format!("m{i}"), "a", i).with_embedding(vec![1.0, x]))
                .unwrap();
        }
        let filter = MemoryFilter::new().with_agent("a").with_limit(2);

        let relational = hybrid
            .hybrid_search(&HybridQuery::new(filter.clone()))
            .unwrap();
        let ranked = hybrid
            .hybrid_search(&HybridQuery::new(filter.clone()).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(relational.len(), 2);
        assert_eq!(ranked.len(), 2);

        let paged = hybrid
            .hybrid_search(
                &HybridQuery::new(filter.with_offset(1)).with_embedding(vec![1.0, 0.0]),
            )
            .unwrap();
        let ids: Vec<&str> = paged.iter().map(|r| r.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        let capped = hybrid
            .hybrid_search(
                &HybridQuery::new(MemoryFilter::new().with_limit(4))
                    .with_embedding(vec![1.0, 0.0])
                    .with_k(3),
            )
            .unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn test_stats() {
        let hybrid = backend();
        hybrid
            .store(record("a", "x", 1).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        hybrid.store(record("b", "x", 1)).unwrap();
        hybrid
            .store(MemoryRecord::new("c", "y", "fact", "z").with_embedding(vec![0.0, 1.0]))
            .unwrap();

        let stats = hybrid.stats().unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.vectorized, 2);
        assert_eq!(stats.by_agent.get("x"), Some(&2));
        assert_eq!(stats.by_type.get("fact"), Some(&1));

        let scoped = hybrid.stats_for_agent("x").unwrap();
        assert_eq!(scoped.total_memories, 2);
        assert_eq!(scoped.vectorized, 1);
    }

    #[test]
    fn test_clear_agent_and_close() {
        let hybrid = backend();
        hybrid
            .store(record("a", "x", 1).with_embedding(vec![1.0, 0.0]))
            .unwrap();
        hybrid.store(record("b", "y", 1)).unwrap();
        assert_eq!(hybrid.clear_agent("x").unwrap(), 1);
        assert_eq!(hybrid.vector().count().unwrap(), 0);
        hybrid.close().unwrap();
        assert_eq!(hybrid.count().unwrap(), 0);
    }
}
