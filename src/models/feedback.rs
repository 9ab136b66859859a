//! Outcome observations.

use super::memory::Attributes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a task as observed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The task succeeded.
    Success,
    /// The task failed.
    Failure,
    /// The task partially succeeded.
    Partial,
}

impl Outcome {
    /// Returns the outcome name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
        }
    }

    /// Returns true for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable observation tying a task to an outcome and a reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Event (task) the observation refers to.
    pub event_id: String,
    /// Trajectory the task belonged to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory_id: Option<String>,
    /// Guardian that handled the task.
    pub guardian_id: String,
    /// Action label.
    pub action: String,
    /// Observed outcome.
    pub outcome: Outcome,
    /// Signed scalar reward.
    pub reward: f64,
    /// Tokens spent.
    pub tokens_cost: u64,
    /// Observation time (Unix epoch milliseconds).
    pub timestamp: u64,
    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Attributes>,
}

impl FeedbackRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        guardian_id: impl Into<String>,
        action: impl Into<String>,
        outcome: Outcome,
        reward: f64,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            trajectory_id: None,
            guardian_id: guardian_id.into(),
            action: action.into(),
            outcome,
            reward,
            tokens_cost: 0,
            timestamp: crate::current_timestamp_millis(),
            metadata: None,
        }
    }

    /// Sets the trajectory.
    #[must_use]
    pub fn with_trajectory(mut self, trajectory_id: impl Into<String>) -> Self {
        self.trajectory_id = Some(trajectory_id.into());
        self
    }

    /// Sets the token cost.
    #[must_use]
    pub const fn with_tokens(mut self, tokens_cost: u64) -> Self {
        self.tokens_cost = tokens_cost;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a metadata entry.
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
}

/// Per-outcome record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Successful observations.
    pub success: usize,
    /// Failed observations.
    pub failure: usize,
    /// Partial observations.
    pub partial: usize,
}

impl OutcomeCounts {
    /// Returns the count for one outcome.
    #[must_use]
    pub const fn get(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Success => self.success,
            Outcome::Failure => self.failure,
            Outcome::Partial => self.partial,
        }
    }

    pub(crate) fn slot(&mut self, outcome: Outcome) -> &mut usize {
        match outcome {
            Outcome::Success => &mut self.success,
            Outcome::Failure => &mut self.failure,
            Outcome::Partial => &mut self.partial,
        }
    }
}

/// Aggregate view over the retained feedback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    /// Number of retained records.
    pub total: usize,
    /// Global success rate (0 when empty).
    pub success_rate: f64,
    /// Mean reward (0 when empty).
    pub avg_reward: f64,
    /// Distinct Guardians with retained records.
    pub guardian_count: usize,
    /// Records per outcome.
    pub by_outcome: OutcomeCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_names() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(
            serde_json::to_value(Outcome::Partial).unwrap(),
            serde_json::json!("partial")
        );
        assert!(Outcome::Success.is_success());
        assert!(!Outcome::Failure.is_success());
    }

    #[test]
    fn test_outcome_counts_slot() {
        let mut counts = OutcomeCounts::default();
        *counts.slot(Outcome::Failure) += 2;
        assert_eq!(counts.get(Outcome::Failure), 2);
        assert_eq!(counts.get(Outcome::Success), 0);
    }

    #[test]
    fn test_feedback_builder() {
        let record = FeedbackRecord::new("task-1", "draconia", "task-complete", Outcome::Success, 1.0)
            .with_trajectory("traj_1_1")
            .with_tokens(500)
            .with_timestamp(7)
            .with_metadata("source", "test");
        assert_eq!(record.tokens_cost, 500);
        assert_eq!(record.timestamp, 7);
        assert_eq!(record.trajectory_id.as_deref(), Some("traj_1_1"));
        assert!(record.metadata.is_some());
    }
}
