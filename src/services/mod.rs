//! Business logic services.
//!
//! Services orchestrate the storage backends and the event bus and provide
//! the high-level Guardian operations.

mod feedback;
mod guardian_memory;
mod pipeline;
pub mod routing;

pub use feedback::{DEFAULT_RECENT_LIMIT, FeedbackRecorder, GuardianFeedback};
pub use guardian_memory::GuardianMemoryManager;
pub use pipeline::{IntelligencePipeline, TASK_OUTCOME_TYPE, UNKNOWN_GUARDIAN};
pub use routing::RoutingEngine;
