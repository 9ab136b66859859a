//! Feature toggles for the intelligence pipeline.

use serde::Deserialize;

/// Feature toggles controlling optional pipeline behavior.
///
/// All features are enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineFeatures {
    /// Assign a trajectory id to every started task.
    pub trajectory_recording: bool,
    /// Count successes as learned patterns and emit learning cycles.
    pub pattern_learning: bool,
    /// Accumulate token spend and raise budget alerts.
    pub cost_tracking: bool,
    /// Store each finished task as a record in its Guardian's namespace.
    pub memory_persistence: bool,
}

impl Default for PipelineFeatures {
    fn default() -> Self {
        Self::all()
    }
}

impl PipelineFeatures {
    /// Creates feature toggles with all features disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            trajectory_recording: false,
            pattern_learning: false,
            cost_tracking: false,
            memory_persistence: false,
        }
    }

    /// Creates feature toggles with all features enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            trajectory_recording: true,
            pattern_learning: true,
            cost_tracking: true,
            memory_persistence: true,
        }
    }

    /// Enables or disables trajectory recording.
    #[must_use]
    pub const fn with_trajectory_recording(mut self, enabled: bool) -> Self {
        self.trajectory_recording = enabled;
        self
    }

    /// Enables or disables pattern learning.
    #[must_use]
    pub const fn with_pattern_learning(mut self, enabled: bool) -> Self {
        self.pattern_learning = enabled;
        self
    }

    /// Enables or disables cost tracking.
    #[must_use]
    pub const fn with_cost_tracking(mut self, enabled: bool) -> Self {
        self.cost_tracking = enabled;
        self
    }

    /// Enables or disables memory persistence.
    #[must_use]
    pub const fn with_memory_persistence(mut self, enabled: bool) -> Self {
        self.memory_persistence = enabled;
        self
    }
}
