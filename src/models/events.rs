//! Observability events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Closed set of event types carried by the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// A task entered the pipeline.
    TaskStart,
    /// A task finished successfully.
    TaskComplete,
    /// A task failed.
    TaskFail,
    /// A host hook fired.
    HookTrigger,
    /// A learned pattern matched.
    PatternMatch,
    /// A learning cycle ran after a success.
    LearningCycle,
    /// Token spend crossed a budget threshold.
    BudgetAlert,
    /// The router chose a Guardian.
    GuardianRoute,
    /// A record was stored into a Guardian namespace.
    MemoryStored,
    /// A Guardian namespace was searched.
    MemorySearch,
    /// A TTL record was pruned.
    MemoryExpired,
    /// A Guardian namespace was cleared.
    GuardianCleared,
    /// A feedback record was appended.
    FeedbackRecorded,
    /// A Guardian's success rate was recomputed.
    SuccessRateChanged,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::TaskStart,
        Self::TaskComplete,
        Self::TaskFail,
        Self::HookTrigger,
        Self::PatternMatch,
        Self::LearningCycle,
        Self::BudgetAlert,
        Self::GuardianRoute,
        Self::MemoryStored,
        Self::MemorySearch,
        Self::MemoryExpired,
        Self::GuardianCleared,
        Self::FeedbackRecorded,
        Self::SuccessRateChanged,
    ];

    /// Returns the kebab-case event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TaskStart => "task-start",
            Self::TaskComplete => "task-complete",
            Self::TaskFail => "task-fail",
            Self::HookTrigger => "hook-trigger",
            Self::PatternMatch => "pattern-match",
            Self::LearningCycle => "learning-cycle",
            Self::BudgetAlert => "budget-alert",
            Self::GuardianRoute => "guardian-route",
            Self::MemoryStored => "memory-stored",
            Self::MemorySearch => "memory-search",
            Self::MemoryExpired => "memory-expired",
            Self::GuardianCleared => "guardian-cleared",
            Self::FeedbackRecorded => "feedback-recorded",
            Self::SuccessRateChanged => "success-rate-changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable observability event.
///
/// An empty `id` and a zero `timestamp` are filled in by the bus on emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique identifier.
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Emission time (Unix epoch milliseconds).
    pub timestamp: u64,
    /// Event payload.
    pub payload: Value,
    /// Guardian the event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_id: Option<String>,
    /// Session the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Event {
    /// Creates an event with an unset id and timestamp.
    #[must_use]
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            id: String::new(),
            event_type,
            timestamp: 0,
            payload,
            guardian_id: None,
            session_id: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Tags the event with a Guardian.
    #[must_use]
    pub fn with_guardian(mut self, guardian_id: impl Into<String>) -> Self {
        self.guardian_id = Some(guardian_id.into());
        self
    }

    /// Tags the event with a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Generates a unique event id (`evt_<uuid>`).
#[must_use]
pub fn generate_event_id() -> String {
    format!("evt_{}", Uuid::new_v4().simple())
}
