//! Query filters and search results.

use super::memory::{Attributes, MemoryRecord};
use serde::{Deserialize, Serialize};

/// Inclusive time window (Unix epoch milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest matching timestamp.
    pub start: u64,
    /// Latest matching timestamp.
    pub end: u64,
}

impl TimeRange {
    /// Creates a new inclusive range.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Returns true if `timestamp` falls inside the range (both ends inclusive).
    #[must_use]
    pub const fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Result ordering for relational queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    /// Newest first.
    #[default]
    Timestamp,
    /// Pass-through; relational backends keep timestamp order.
    Relevance,
}

/// Relational filter over memory records.
///
/// Every populated predicate must match. `metadata` requires all given pairs
/// to be equal (records without metadata never match), `tags` is any-of, and
/// an empty tag list imposes no constraint.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::MemoryFilter;
///
/// let filter = MemoryFilter::new()
///     .with_agent("guardian:draconia")
///     .with_type("task-outcome")
///     .with_limit(5);
/// assert_eq!(filter.limit, Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFilter {
    /// Exact owning namespace.
    pub agent_id: Option<String>,
    /// Exact type tag.
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    /// Inclusive time window.
    pub time_range: Option<TimeRange>,
    /// Exact metadata pairs.
    pub metadata: Option<Attributes>,
    /// Any-of tag match.
    pub tags: Option<Vec<String>>,
    /// Number of matching records to skip.
    pub offset: Option<usize>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Result ordering.
    #[serde(default)]
    pub order_by: OrderBy,
}

impl MemoryFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one owning namespace.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Restricts to one type tag.
    #[must_use]
    pub fn with_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    /// Restricts to an inclusive time window.
    #[must_use]
    pub const fn with_time_range(mut self, start: u64, end: u64) -> Self {
        self.time_range = Some(TimeRange::new(start, end));
        self
    }

    /// Requires a metadata pair.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata
            .get_or_insert_with(Attributes::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a tag to the any-of set.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Sets the offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Returns true if `record` satisfies every predicate.
    ///
    /// Pagination (`offset`, `limit`) and ordering are not predicates and are
    /// ignored here.
    #[must_use]
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if self
            .agent_id
            .as_deref()
            .is_some_and(|agent| agent != record.agent_id)
        {
            return false;
        }
        if self
            .memory_type
            .as_deref()
            .is_some_and(|t| t != record.memory_type)
        {
            return false;
        }
        if self
            .time_range
            .is_some_and(|range| !range.contains(record.timestamp))
        {
            return false;
        }
        if let Some(wanted) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            let Some(actual) = record.metadata.as_ref() else {
                return false;
            };
            if !wanted.iter().all(|(k, v)| actual.get(k) == Some(v)) {
                return false;
            }
        }
        if let Some(wanted) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            let Some(actual) = record.tags.as_ref() else {
                return false;
            };
            if !wanted.iter().any(|tag| actual.contains(tag)) {
                return false;
            }
        }
        true
    }
}

/// A record paired with its similarity to a query embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMemory {
    /// The matching record.
    pub memory: MemoryRecord,
    /// Cosine similarity in `[-1, 1]`; `1.0` when no ranking was requested.
    pub similarity: f32,
}

/// Combined filter-and-rank request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridQuery {
    /// Relational predicates applied after ranking.
    pub filter: MemoryFilter,
    /// Query embedding; `None` means relational-only.
    pub embedding: Option<Vec<f32>>,
    /// Maximum number of results.
    pub k: usize,
}

impl HybridQuery {
    /// Default number of hybrid search results.
    pub const DEFAULT_K: usize = 10;

    /// Creates a relational-only query returning up to [`Self::DEFAULT_K`] results.
    #[must_use]
    pub fn new(filter: MemoryFilter) -> Self {
        Self {
            filter,
            embedding: None,
            k: Self::DEFAULT_K,
        }
    }

    /// Adds a query embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub const fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }
}
