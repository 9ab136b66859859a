//! # Guardian Cognition
//!
//! Hybrid memory and adaptive task routing for a council of specialised
//! worker identities ("Guardians").
//!
//! The crate provides two cooperating halves:
//!
//! - A hybrid memory store: typed [`MemoryRecord`]s with optional embeddings,
//!   held in a relational backend and a parallel vector index, partitioned by
//!   Guardian namespace (`guardian:<id>`) and subject to a retention policy.
//! - An adaptive router: a table-driven keyword scorer that assigns task
//!   descriptions to a Guardian and adjusts its confidence from recorded
//!   outcomes.
//!
//! Both halves report through an in-process [`EventBus`], and the
//! [`IntelligencePipeline`] ties them together behind a task lifecycle API.
//!
//! ## Example
//!
//! ```rust
//! use guardian_cognition::{CognitionConfig, IntelligencePipeline};
//!
//! let pipeline = IntelligencePipeline::new(CognitionConfig::default())?;
//! let task_id = pipeline.on_task_start("optimize the performance of the query", None);
//! pipeline.on_task_complete(&task_id, serde_json::json!({"rows": 12}), Some(500));
//!
//! let insight = pipeline.guardian_insight("draconia");
//! assert_eq!(insight.feedback_count, 1);
//! # Ok::<(), guardian_cognition::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod ring_buffer;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CognitionConfig, PipelineFeatures};
pub use models::{
    Event, EventType, FeedbackRecord, GuardianConfig, HybridQuery, MemoryFilter, MemoryId,
    MemoryRecord, Outcome, RetentionPolicy, RoutingDecision, ScoredMemory,
};
pub use observability::EventBus;
pub use ring_buffer::RingBuffer;
pub use services::{FeedbackRecorder, GuardianMemoryManager, IntelligencePipeline, RoutingEngine};
pub use storage::{HybridBackend, MemoryBackend, RelationalBackend, VectorBackend};

/// Error type for guardian cognition operations.
///
/// Absence (unknown ids, empty results, nothing to prune) is never an error;
/// those paths return `Option`, `bool` or an empty collection.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Vector store without a usable embedding, invalid Guardian registration |
/// | `OperationFailed` | Poisoned locks, unreadable config files, duplicate logging init |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A record stored into the vector backend has no embedding
    /// - An embedding's length differs from the backend's dimensionality
    /// - A Guardian extension has a zero or duplicate frequency
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A lock guarding shared state is poisoned
    /// - A configuration file cannot be read or parsed
    /// - Logging or metrics are initialised twice
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds the error reported when a lock guarding shared state is poisoned.
    pub(crate) fn lock_poisoned(operation: &str) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }
}

/// Result type alias for guardian cognition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use guardian_cognition::current_timestamp_millis;
///
/// assert!(current_timestamp_millis() > 0);
/// ```
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");
    }

    #[test]
    fn test_lock_poisoned_error() {
        let err = Error::lock_poisoned("store");
        assert_eq!(err.to_string(), "operation 'store' failed: Lock poisoned");
    }

    #[test]
    fn test_current_timestamp_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(current_timestamp_millis() > 1_577_836_800_000);
    }
}
