//! Pipeline read models.

use super::{FeedbackRecord, GuardianConfig, GuardianProfile, OutcomeCounts};
use serde::Serialize;
use std::time::Duration;

/// Counters reported by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    /// Events currently held in the bus history.
    pub events_processed: usize,
    /// Trajectory ids issued.
    pub trajectories_recorded: u64,
    /// Successful tasks counted by pattern learning.
    pub patterns_learned: u64,
    /// Tokens accumulated by cost tracking.
    pub tokens_tracked: u64,
    /// Routing decisions made by the router.
    pub routing_decisions: u64,
    /// Mean routing latency.
    pub avg_routing_latency: Duration,
    /// Mean routing confidence.
    pub avg_routing_confidence: f64,
    /// Retained feedback records.
    pub feedback_records: usize,
    /// Time since construction or the last reset.
    pub uptime: Duration,
}

/// Everything the pipeline knows about one Guardian.
///
/// Unknown Guardians yield `None` for the static parts and zero for the
/// aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianInsight {
    /// Guardian id as queried.
    pub guardian_id: String,
    /// Registered configuration.
    pub config: Option<GuardianConfig>,
    /// Router profile.
    pub profile: Option<GuardianProfile>,
    /// Retained feedback records.
    pub feedback_count: usize,
    /// Success rate over retained feedback.
    pub success_rate: f64,
    /// Mean reward over retained feedback.
    pub avg_reward: f64,
    /// Tokens spent over retained feedback.
    pub tokens: u64,
    /// Feedback per outcome.
    pub by_outcome: OutcomeCounts,
    /// Most recent feedback, newest first.
    pub recent_feedback: Vec<FeedbackRecord>,
    /// Records in the Guardian's memory namespace.
    pub memory_count: usize,
}
