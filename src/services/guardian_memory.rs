//! Guardian namespace and retention manager.
//!
//! Wraps a [`HybridBackend`] with per-Guardian namespacing. Every record
//! stored for a Guardian is owned by `guardian:<id>` and every query or
//! search issued for a Guardian is scoped to that namespace, so Guardian A's
//! queries never surface Guardian B's records. Isolation is a filtering
//! discipline over co-located storage; there is no per-namespace locking.
//!
//! # Retention
//!
//! | Policy | Pruned by [`GuardianMemoryManager::prune_expired`] | Cleared by [`GuardianMemoryManager::close`] |
//! |--------|------|------|
//! | `permanent` | never | no |
//! | `session` | never | yes |
//! | `ttl(d)` | records older than `d` | no |

use crate::models::{
    Event, EventType, GuardianConfig, HybridQuery, MemoryFilter, MemoryRecord, MemoryStats,
    RetentionPolicy, ScoredMemory, canonical_guardians, namespace_for,
};
use crate::observability::EventBus;
use crate::storage::{HybridBackend, MemoryBackend};
use crate::{Error, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::instrument;

/// Namespaced, retention-aware memory for Guardians.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::{EventBus, GuardianMemoryManager, MemoryFilter, MemoryRecord};
/// use guardian_cognition::storage::HybridBackend;
/// use std::sync::Arc;
///
/// let manager = GuardianMemoryManager::new(Arc::new(HybridBackend::default()), EventBus::default());
/// manager.store_for_guardian("draconia", MemoryRecord::new("m1", "ignored", "note", "hot path"))?;
///
/// assert_eq!(manager.query_guardian("draconia", MemoryFilter::new())?.len(), 1);
/// assert!(manager.query_guardian("lyria", MemoryFilter::new())?.is_empty());
/// # Ok::<(), guardian_cognition::Error>(())
/// ```
#[derive(Debug)]
pub struct GuardianMemoryManager {
    backend: Arc<HybridBackend>,
    bus: EventBus,
    guardians: RwLock<Vec<GuardianConfig>>,
}

impl GuardianMemoryManager {
    /// Creates a manager over the ten canonical Guardians.
    #[must_use]
    pub fn new(backend: Arc<HybridBackend>, bus: EventBus) -> Self {
        Self {
            backend,
            bus,
            guardians: RwLock::new(canonical_guardians()),
        }
    }

    /// Creates a manager over an explicit Guardian table, replacing the
    /// canonical one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an entry is malformed or ids or
    /// frequencies repeat.
    pub fn with_configs(
        backend: Arc<HybridBackend>,
        bus: EventBus,
        configs: Vec<GuardianConfig>,
    ) -> Result<Self> {
        let manager = Self {
            backend,
            bus,
            guardians: RwLock::new(Vec::with_capacity(configs.len())),
        };
        for config in configs {
            manager.register_guardian(config)?;
        }
        Ok(manager)
    }

    /// Adds a Guardian to the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the entry is malformed or its id or
    /// frequency is already taken.
    pub fn register_guardian(&self, config: GuardianConfig) -> Result<()> {
        config.validate()?;
        let mut guardians = self
            .guardians
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guardians
            .iter()
            .find(|g| g.id == config.id || g.frequency == config.frequency)
        {
            return Err(Error::InvalidInput(format!(
                "guardian '{}' (frequency {}) conflicts with '{}' (frequency {})",
                config.id, config.frequency, existing.id, existing.frequency
            )));
        }
        tracing::debug!(guardian_id = %config.id, frequency = config.frequency, "guardian registered");
        let position = guardians.partition_point(|g| g.frequency < config.frequency);
        guardians.insert(position, config);
        Ok(())
    }

    /// Returns one Guardian's configuration.
    #[must_use]
    pub fn config(&self, guardian_id: &str) -> Option<GuardianConfig> {
        self.guardians
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|g| g.id == guardian_id)
            .cloned()
    }

    /// Returns every Guardian ordered by ascending frequency.
    #[must_use]
    pub fn configs(&self) -> Vec<GuardianConfig> {
        self.guardians
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The underlying hybrid backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<HybridBackend> {
        &self.backend
    }

    /// Stores a record in the Guardian's namespace.
    ///
    /// The record's `agent_id` is rewritten to `guardian:<id>`; unknown ids
    /// still receive that namespace. Emits `memory-stored`.
    pub fn store_for_guardian(&self, guardian_id: &str, mut record: MemoryRecord) -> Result<()> {
        record.agent_id = namespace_for(guardian_id);
        let memory_id = record.id.clone();
        let memory_type = record.memory_type.clone();
        let has_embedding = record.usable_embedding().is_some();
        let session_id = record.session_id.clone();

        self.backend.store(record)?;

        let mut event = Event::new(
            EventType::MemoryStored,
            json!({
                "memoryId": memory_id.as_str(),
                "type": memory_type,
                "namespace": namespace_for(guardian_id),
                "hasEmbedding": has_embedding,
            }),
        )
        .with_guardian(guardian_id);
        if !session_id.is_empty() {
            event = event.with_session(session_id);
        }
        self.bus.emit_event(event);
        metrics::counter!("guardian_memory_store_total").increment(1);
        Ok(())
    }

    /// Relational query scoped to the Guardian's namespace.
    ///
    /// Any `agent_id` in `filter` is replaced.
    pub fn query_guardian(
        &self,
        guardian_id: &str,
        filter: MemoryFilter,
    ) -> Result<Vec<MemoryRecord>> {
        self.backend
            .query(&filter.with_agent(namespace_for(guardian_id)))
    }

    /// Vector search scoped to the Guardian's namespace.
    ///
    /// Ranks the whole index before scoping, so a Guardian with few records
    /// still receives up to `k` of its own. Emits `memory-search`.
    pub fn search_guardian(
        &self,
        guardian_id: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredMemory>> {
        self.hybrid_search_guardian(
            guardian_id,
            HybridQuery::new(MemoryFilter::new())
                .with_embedding(embedding.to_vec())
                .with_k(k),
        )
    }

    /// Hybrid search scoped to the Guardian's namespace. Emits `memory-search`.
    pub fn hybrid_search_guardian(
        &self,
        guardian_id: &str,
        mut query: HybridQuery,
    ) -> Result<Vec<ScoredMemory>> {
        query.filter.agent_id = Some(namespace_for(guardian_id));
        let results = self.backend.hybrid_search(&query)?;
        self.bus.emit_event(
            Event::new(
                EventType::MemorySearch,
                json!({
                    "namespace": namespace_for(guardian_id),
                    "vector": query.embedding.is_some(),
                    "k": query.k,
                    "results": results.len(),
                }),
            )
            .with_guardian(guardian_id),
        );
        Ok(results)
    }

    /// Deletes every record in the Guardian's namespace. Emits `guardian-cleared`.
    #[instrument(name = "guardian_cognition.memory.clear_guardian", skip(self))]
    pub fn clear_guardian(&self, guardian_id: &str) -> Result<usize> {
        let removed = self.backend.clear_agent(&namespace_for(guardian_id))?;
        self.bus.emit_event(
            Event::new(
                EventType::GuardianCleared,
                json!({ "namespace": namespace_for(guardian_id), "removed": removed }),
            )
            .with_guardian(guardian_id),
        );
        tracing::info!(removed, "guardian namespace cleared");
        Ok(removed)
    }

    /// Prunes expired records of `ttl` Guardians as of now.
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(crate::current_timestamp_millis())
    }

    /// Prunes records of `ttl` Guardians older than their TTL as of `now_ms`.
    ///
    /// `permanent` and `session` namespaces are never touched. Emits one
    /// `memory-expired` per deletion and returns the total deleted.
    #[instrument(name = "guardian_cognition.memory.prune_expired", skip(self))]
    pub fn prune_expired_at(&self, now_ms: u64) -> Result<usize> {
        let mut pruned = 0;
        for guardian in self.configs() {
            let ttl_ms = match guardian.retention {
                RetentionPolicy::Ttl(ttl) => u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
                RetentionPolicy::Permanent | RetentionPolicy::Session => continue,
            };

            for record in self.query_guardian(&guardian.id, MemoryFilter::new())? {
                let age = now_ms.saturating_sub(record.timestamp);
                if age <= ttl_ms || !self.backend.delete(&record.id)? {
                    continue;
                }
                pruned += 1;
                self.bus.emit_event(
                    Event::new(
                        EventType::MemoryExpired,
                        json!({
                            "memoryId": record.id.as_str(),
                            "ageMs": age,
                            "ttlMs": ttl_ms,
                        }),
                    )
                    .with_guardian(guardian.id.as_str()),
                );
            }
        }

        metrics::counter!("guardian_memory_pruned_total").increment(pruned as u64);
        tracing::info!(pruned, "expired guardian memories pruned");
        Ok(pruned)
    }

    /// Statistics for one Guardian's namespace.
    pub fn guardian_stats(&self, guardian_id: &str) -> Result<MemoryStats> {
        self.backend.stats_for_agent(&namespace_for(guardian_id))
    }

    /// Statistics for every registered Guardian, keyed by id.
    pub fn all_guardian_stats(&self) -> Result<HashMap<String, MemoryStats>> {
        self.configs()
            .into_iter()
            .map(|g| {
                let stats = self.guardian_stats(&g.id)?;
                Ok((g.id, stats))
            })
            .collect()
    }

    /// Teardown: clears every `session` Guardian, then releases the backend.
    #[instrument(name = "guardian_cognition.memory.close", skip(self))]
    pub fn close(&self) -> Result<()> {
        for guardian in self.configs() {
            if guardian.retention == RetentionPolicy::Session {
                self.clear_guardian(&guardian.id)?;
            }
        }
        self.backend.close()
    }
}
