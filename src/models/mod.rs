//! Data models for guardian cognition.
//!
//! This module contains the core data structures shared by the storage
//! backends, the Guardian services and the pipeline.

mod events;
mod feedback;
mod guardian;
mod insight;
mod memory;
mod routing;
mod search;

pub use events::{Event, EventType, generate_event_id};
pub use feedback::{FeedbackRecord, FeedbackStats, Outcome, OutcomeCounts};
pub use guardian::{
    GUARDIAN_NAMESPACE_PREFIX, GuardianConfig, RetentionPolicy, canonical_guardians,
    namespace_for,
};
pub use insight::{GuardianInsight, PipelineStats};
pub use memory::{Attributes, MemoryId, MemoryRecord, MemoryStats};
pub use routing::{GuardianProfile, RoutingDecision, RoutingStats};
pub use search::{HybridQuery, MemoryFilter, OrderBy, ScoredMemory, TimeRange};
