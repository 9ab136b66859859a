//! Memory backend trait.
//!
//! Every backend (relational, vector, hybrid) satisfies the same contract:
//! absence is a normal outcome (`Option`, `bool`, empty `Vec`), never an
//! error, and each call either applies fully or not at all.
//!
//! # Available Implementations
//!
//! | Backend | Capability |
//! |---------|------------|
//! | `RelationalBackend` | Exact/range filtering; `vector_search` is an empty no-op |
//! | `VectorBackend` | Fixed-dimension cosine ranking; requires embeddings |
//! | `HybridBackend` | Dual-write over both, filter-after-rank search |

use crate::Result;
use crate::models::{MemoryFilter, MemoryId, MemoryRecord, ScoredMemory};

/// Trait for memory storage backends.
///
/// Methods take `&self`; implementations guard their state internally so a
/// backend can be shared across threads.
pub trait MemoryBackend: Send + Sync {
    /// Stores a record, overwriting any record with the same id.
    fn store(&self, record: MemoryRecord) -> Result<()>;

    /// Retrieves a record by id.
    fn retrieve(&self, id: &MemoryId) -> Result<Option<MemoryRecord>>;

    /// Replaces an existing record. Returns false (no-op) if the id is absent.
    fn update(&self, record: MemoryRecord) -> Result<bool>;

    /// Deletes a record. Returns false (no-op) if the id is absent.
    fn delete(&self, id: &MemoryId) -> Result<bool>;

    /// Returns records matching the filter.
    fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>>;

    /// Returns up to `k` records ranked by cosine similarity to `embedding`.
    fn vector_search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredMemory>>;

    /// Deletes every record owned by `agent_id`, returning the number removed.
    fn clear_agent(&self, agent_id: &str) -> Result<usize>;

    /// Returns the number of stored records.
    fn count(&self) -> Result<usize>;

    /// Releases all held state.
    fn close(&self) -> Result<()>;

    /// Checks if a record exists.
    fn exists(&self, id: &MemoryId) -> Result<bool> {
        Ok(self.retrieve(id)?.is_some())
    }
}
