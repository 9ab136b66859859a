//! Memory records and identifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Free-form key/value map attached to a record.
pub type Attributes = BTreeMap<String, Value>;

/// Unique identifier for a memory record within a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered memory ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("mem_{}", uuid::Uuid::now_v7().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A typed memory record.
///
/// A record without an embedding is invisible to vector search but fully
/// visible to relational queries. `parent_id` is a weak reference: deleting
/// the parent never cascades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: MemoryId,
    /// Owning namespace (for Guardian records, `guardian:<id>`).
    pub agent_id: String,
    /// Session the record was produced in.
    pub session_id: String,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub memory_type: String,
    /// Opaque payload.
    pub content: Value,
    /// Context map.
    #[serde(default)]
    pub context: Attributes,
    /// Creation time (Unix epoch milliseconds).
    pub timestamp: u64,
    /// Optional fixed-length embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Optional metadata, matched exactly by filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Attributes>,
    /// Optional tags, matched with any-of semantics by filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Optional version counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Optional parent record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MemoryId>,
}

impl MemoryRecord {
    /// Creates a record stamped with the current time and no optional fields.
    #[must_use]
    pub fn new(
        id: impl Into<MemoryId>,
        agent_id: impl Into<String>,
        memory_type: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            session_id: String::new(),
            memory_type: memory_type.into(),
            content: content.into(),
            context: Attributes::new(),
            timestamp: crate::current_timestamp_millis(),
            embedding: None,
            metadata: None,
            tags: None,
            version: None,
            parent_id: None,
        }
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the timestamp (Unix epoch milliseconds).
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Attributes::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the parent reference.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<MemoryId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Returns the embedding if present and non-empty.
    #[must_use]
    pub fn usable_embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }
}

/// Aggregate statistics over a hybrid store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Total number of records.
    pub total_memories: usize,
    /// Record count per owning namespace.
    pub by_agent: HashMap<String, usize>,
    /// Record count per type tag.
    pub by_type: HashMap<String, usize>,
    /// Records that are also present in the vector index.
    pub vectorized: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_id_display() {
        let id = MemoryId::new("mem-1");
        assert_eq!(id.to_string(), "mem-1");
        assert_eq!(id.as_str(), "mem-1");
        assert_eq!(MemoryId::from("mem-1"), id);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = MemoryId::generate();
        let b = MemoryId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("mem_"));
    }

    #[test]
    fn test_builder_sets_optional_fields() {
        let record = MemoryRecord::new("m1", "agent", "note", "hello")
            .with_session("s1")
            .with_timestamp(42)
            .with_embedding(vec![1.0, 0.0])
            .with_metadata("lang", "rust")
            .with_tag("a")
            .with_tag("b")
            .with_version(2)
            .with_parent("m0")
            .with_context("source", json!("cli"));

        assert_eq!(record.session_id, "s1");
        assert_eq!(record.timestamp, 42);
        assert_eq!(record.usable_embedding(), Some(&[1.0, 0.0][..]));
        assert_eq!(record.metadata.unwrap().get("lang"), Some(&json!("rust")));
        assert_eq!(record.tags.unwrap(), vec!["a", "b"]);
        assert_eq!(record.version, Some(2));
        assert_eq!(record.parent_id, Some(MemoryId::new("m0")));
        assert_eq!(record.context.get("source"), Some(&json!("cli")));
    }

    #[test]
    fn test_empty_embedding_is_not_usable() {
        let record = MemoryRecord::new("m1", "agent", "note", "x").with_embedding(Vec::new());
        assert!(record.usable_embedding().is_none());
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let record = MemoryRecord::new("m1", "agent", "note", "x").with_timestamp(1);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["agentId"], json!("agent"));
        assert_eq!(value["type"], json!("note"));
        assert!(value.get("embedding").is_none());
    }
}
