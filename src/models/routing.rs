//! Routing decisions and Guardian profiles.

use serde::Serialize;
use std::time::Duration;

/// A transient routing decision. The engine does not persist it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Chosen Guardian.
    pub guardian_id: String,
    /// Display name of the chosen Guardian.
    pub guardian_name: String,
    /// Role label of the chosen Guardian.
    pub gate: String,
    /// Ordering key of the chosen Guardian.
    pub frequency: u32,
    /// Confidence in `(0, 1]`.
    pub confidence: f64,
    /// Human-readable explanation.
    pub reasoning: String,
    /// Keywords found in the task text.
    pub matched_keywords: Vec<String>,
    /// Time spent deciding.
    pub latency: Duration,
}

impl RoutingDecision {
    /// Returns true if the decision fell back to the default Guardian.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.matched_keywords.is_empty()
    }
}

/// Static identity plus learned statistics of one Guardian.
///
/// Profiles handed out by the router are copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianProfile {
    /// Guardian id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role label.
    pub gate: String,
    /// Ordering key.
    pub frequency: u32,
    /// Element label.
    pub element: String,
    /// Domain keywords the router scores against.
    pub domains: Vec<String>,
    /// Recorded successful outcomes.
    pub successes: u64,
    /// Recorded outcomes of any kind.
    pub total_tasks: u64,
    /// Patterns reinforced by successes.
    pub pattern_count: u64,
}

impl GuardianProfile {
    /// Observed success rate, `successes / total_tasks`, or 0 without data.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_tasks as f64
        }
    }

    /// Laplace-smoothed success rate used for confidence, `(s + 1) / (t + 2)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn smoothed_success_rate(&self) -> f64 {
        (self.successes as f64 + 1.0) / (self.total_tasks as f64 + 2.0)
    }
}

/// Router-wide running statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStats {
    /// Decisions made.
    pub total_routes: u64,
    /// Mean decision latency.
    pub avg_latency: Duration,
    /// Mean decision confidence.
    pub avg_confidence: f64,
    /// Outcomes fed back into the router.
    pub outcomes_recorded: u64,
}
