//! Task lifecycle pipeline.
//!
//! [`IntelligencePipeline`] is an explicit handle owning one event bus,
//! router, feedback recorder and Guardian memory manager. Construct it once
//! and pass it by reference; [`IntelligencePipeline::reset`] restores a clean
//! state for test isolation.
//!
//! # Lifecycle
//!
//! 1. [`on_task_start`](IntelligencePipeline::on_task_start) resolves a
//!    Guardian (routing when none is given) and returns a task id.
//! 2. [`on_task_complete`](IntelligencePipeline::on_task_complete) or
//!    [`on_task_fail`](IntelligencePipeline::on_task_fail) records feedback
//!    against the Guardian resolved at start.
//!
//! Task bookkeeping is best effort: finishing an unknown or already finished
//! task still records feedback, against the `unknown` Guardian.

use crate::config::CognitionConfig;
use crate::models::{
    Event, EventType, FeedbackRecord, GuardianInsight, MemoryId, MemoryRecord, Outcome,
    PipelineStats, RoutingDecision, generate_event_id,
};
use crate::observability::EventBus;
use crate::services::{FeedbackRecorder, GuardianMemoryManager, RoutingEngine};
use crate::storage::HybridBackend;
use crate::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt::{Display, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::instrument;

/// Guardian recorded for tasks the pipeline has no bookkeeping for.
pub const UNKNOWN_GUARDIAN: &str = "unknown";

/// Memory type of persisted task outcomes.
pub const TASK_OUTCOME_TYPE: &str = "task-outcome";

const INSIGHT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
struct ActiveTask {
    text: String,
    guardian_id: String,
    decision: Option<RoutingDecision>,
    trajectory_id: Option<String>,
}

#[derive(Debug)]
struct Counters {
    trajectories: u64,
    patterns: u64,
    tokens: u64,
    warning_sent: bool,
    critical_sent: bool,
    started: Instant,
}

impl Counters {
    fn new() -> Self {
        Self {
            trajectories: 0,
            patterns: 0,
            tokens: 0,
            warning_sent: false,
            critical_sent: false,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BudgetLevel {
    Warning,
    Critical,
}

impl BudgetLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Orchestrates routing, feedback and memory behind a task lifecycle API.
#[derive(Debug)]
pub struct IntelligencePipeline {
    config: CognitionConfig,
    bus: EventBus,
    router: RoutingEngine,
    recorder: FeedbackRecorder,
    memory: GuardianMemoryManager,
    tasks: Mutex<HashMap<String, ActiveTask>>,
    counters: Mutex<Counters>,
}

impl IntelligencePipeline {
    /// Builds a pipeline from configuration.
    ///
    /// Extension Guardians in `config.guardians` are added to both the router
    /// (without domain keywords) and the memory manager.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if an extension Guardian is
    /// invalid or the default Guardian is not registered.
    pub fn new(config: CognitionConfig) -> Result<Self> {
        let bus = EventBus::new(config.event_history_capacity);
        let backend = Arc::new(HybridBackend::new(config.vector));
        let memory = GuardianMemoryManager::new(backend, bus.clone());
        let router = RoutingEngine::new();
        for guardian in &config.guardians {
            router.register_guardian(guardian, &[])?;
            memory.register_guardian(guardian.clone())?;
        }
        let router = router.with_default_guardian(&config.default_guardian)?;
        let recorder = FeedbackRecorder::new(config.feedback_capacity, bus.clone());

        tracing::info!(
            features = ?config.features,
            guardians = memory.configs().len(),
            "intelligence pipeline ready"
        );

        Ok(Self {
            config,
            bus,
            router,
            recorder,
            memory,
            tasks: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::new()),
        })
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, ActiveTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration the pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &CognitionConfig {
        &self.config
    }

    /// The shared event bus.
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// The router.
    #[must_use]
    pub const fn router(&self) -> &RoutingEngine {
        &self.router
    }

    /// The feedback recorder.
    #[must_use]
    pub const fn recorder(&self) -> &FeedbackRecorder {
        &self.recorder
    }

    /// The Guardian memory manager.
    #[must_use]
    pub const fn memory(&self) -> &GuardianMemoryManager {
        &self.memory
    }

    /// Starts a task and returns its id.
    ///
    /// Routes `text` when `guardian_id` is `None`. Emits `task-start` tagged
    /// with the resolved Guardian; the event id is the task id.
    pub fn on_task_start(&self, text: &str, guardian_id: Option<&str>) -> String {
        let task_id = generate_event_id();

        let trajectory_id = self.config.features.trajectory_recording.then(|| {
            let mut counters = self.counters();
            counters.trajectories += 1;
            format!(
                "traj_{}_{}",
                crate::current_timestamp_millis(),
                counters.trajectories
            )
        });

        let (guardian_id, decision) = match guardian_id {
            Some(id) => (id.to_string(), None),
            None => {
                let decision = self.router.route(text);
                (decision.guardian_id.clone(), Some(decision))
            },
        };

        self.tasks().insert(
            task_id.clone(),
            ActiveTask {
                text: text.to_string(),
                guardian_id: guardian_id.clone(),
                decision,
                trajectory_id: trajectory_id.clone(),
            },
        );

        self.bus.emit_event(
            Event::new(
                EventType::TaskStart,
                json!({ "task": text, "trajectoryId": trajectory_id }),
            )
            .with_id(task_id.clone())
            .with_guardian(guardian_id.as_str()),
        );
        tracing::debug!(task_id = %task_id, guardian_id = %guardian_id, "task started");
        task_id
    }

    /// Completes a task: emits `task-complete` and records a success with
    /// reward `1.0`.
    pub fn on_task_complete(&self, task_id: &str, result: Value, tokens_cost: Option<u64>) {
        self.finish(task_id, Outcome::Success, "result", result, tokens_cost);
    }

    /// Fails a task: emits `task-fail` and records a failure with reward
    /// `-1.0`.
    pub fn on_task_fail(&self, task_id: &str, error: impl Display, tokens_cost: Option<u64>) {
        self.finish(
            task_id,
            Outcome::Failure,
            "error",
            Value::String(error.to_string()),
            tokens_cost,
        );
    }

    fn finish(
        &self,
        task_id: &str,
        outcome: Outcome,
        detail_key: &str,
        detail: Value,
        tokens_cost: Option<u64>,
    ) {
        let task = self.tasks().remove(task_id);
        if task.is_none() {
            tracing::warn!(task_id, outcome = %outcome, "finishing unknown task");
        }
        let guardian_id = task
            .as_ref()
            .map_or(UNKNOWN_GUARDIAN, |t| t.guardian_id.as_str())
            .to_string();
        let trajectory_id = task.as_ref().and_then(|t| t.trajectory_id.clone());
        let cost = tokens_cost.unwrap_or(0);

        if self.config.features.cost_tracking {
            self.track_tokens(cost);
        }

        let (event_type, reward) = if outcome.is_success() {
            (EventType::TaskComplete, 1.0)
        } else {
            (EventType::TaskFail, -1.0)
        };
        let mut payload = json!({
            "taskId": task_id,
            "tokensCost": cost,
            "trajectoryId": trajectory_id,
        });
        payload[detail_key] = detail.clone();
        let event = self
            .bus
            .emit_event(Event::new(event_type, payload).with_guardian(guardian_id.as_str()));

        let action = task.as_ref().map_or(UNKNOWN_GUARDIAN, |t| t.text.as_str());
        let mut feedback = FeedbackRecord::new(event.id, guardian_id.as_str(), action, outcome, reward)
            .with_tokens(cost);
        if let Some(trajectory_id) = &trajectory_id {
            feedback = feedback.with_trajectory(trajectory_id.as_str());
        }
        self.recorder.record(feedback);

        if let Some(decision) = task.as_ref().and_then(|t| t.decision.as_ref()) {
            self.router.record_outcome(decision, outcome, reward);
        }

        if outcome.is_success() && self.config.features.pattern_learning {
            let patterns = {
                let mut counters = self.counters();
                counters.patterns += 1;
                counters.patterns
            };
            self.bus.emit_event(
                Event::new(
                    EventType::LearningCycle,
                    json!({ "taskId": task_id, "patternsLearned": patterns }),
                )
                .with_guardian(guardian_id.as_str()),
            );
        }

        if let Some(task) = task.filter(|_| self.config.features.memory_persistence) {
            let mut content = json!({
                "task": task.text,
                "outcome": outcome.as_str(),
                "tokensCost": cost,
            });
            content[detail_key] = detail;
            let record = MemoryRecord::new(
                MemoryId::generate(),
                guardian_id.as_str(),
                TASK_OUTCOME_TYPE,
                content,
            )
            .with_context("taskId", task_id)
            .with_metadata("outcome", outcome.as_str());
            if let Err(e) = self.memory.store_for_guardian(&guardian_id, record) {
                tracing::warn!(task_id, error = %e, "failed to persist task outcome");
            }
        }

        tracing::debug!(task_id, guardian_id = %guardian_id, outcome = %outcome, "task finished");
    }

    fn track_tokens(&self, cost: u64) {
        let (tracked, alerts) = {
            let mut counters = self.counters();
            counters.tokens = counters.tokens.saturating_add(cost);
            let mut alerts = Vec::new();
            if let Some(budget) = self.config.budget.token_budget.filter(|b| *b > 0) {
                #[allow(clippy::cast_precision_loss)]
                let ratio = counters.tokens as f64 / budget as f64;
                if !counters.warning_sent && ratio >= self.config.budget.warning_ratio {
                    counters.warning_sent = true;
                    alerts.push((BudgetLevel::Warning, ratio, budget));
                }
                if !counters.critical_sent && ratio >= self.config.budget.critical_ratio {
                    counters.critical_sent = true;
                    alerts.push((BudgetLevel::Critical, ratio, budget));
                }
            }
            (counters.tokens, alerts)
        };

        metrics::counter!("pipeline_tokens_tracked").increment(cost);
        for (level, ratio, budget) in alerts {
            tracing::warn!(level = level.as_str(), tracked, budget, "token budget alert");
            self.bus.emit_event(Event::new(
                EventType::BudgetAlert,
                json!({
                    "level": level.as_str(),
                    "tokensTracked": tracked,
                    "tokenBudget": budget,
                    "ratio": ratio,
                }),
            ));
        }
    }

    /// Routes `text` without starting a task. Emits `guardian-route`.
    pub fn route_task(&self, text: &str) -> RoutingDecision {
        let decision = self.router.route(text);
        let payload = serde_json::to_value(&decision).unwrap_or(Value::Null);
        self.bus.emit_event(
            Event::new(
                EventType::GuardianRoute,
                json!({ "task": text, "decision": payload }),
            )
            .with_guardian(decision.guardian_id.as_str()),
        );
        decision
    }

    /// Records feedback that did not come from the task lifecycle.
    pub fn record_feedback(&self, feedback: FeedbackRecord) {
        self.recorder.record(feedback);
    }

    /// Current pipeline statistics.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let routing = self.router.stats();
        let (trajectories, patterns, tokens, uptime) = {
            let counters = self.counters();
            (
                counters.trajectories,
                counters.patterns,
                counters.tokens,
                counters.started.elapsed(),
            )
        };
        PipelineStats {
            events_processed: self.bus.len(),
            trajectories_recorded: trajectories,
            patterns_learned: patterns,
            tokens_tracked: tokens,
            routing_decisions: routing.total_routes,
            avg_routing_latency: routing.avg_latency,
            avg_routing_confidence: routing.avg_confidence,
            feedback_records: self.recorder.len(),
            uptime,
        }
    }

    /// Merges router profile, feedback aggregates and memory usage for one
    /// Guardian. Never fails.
    #[must_use]
    pub fn guardian_insight(&self, guardian_id: &str) -> GuardianInsight {
        let feedback = self.recorder.guardian_feedback(guardian_id);
        GuardianInsight {
            guardian_id: guardian_id.to_string(),
            config: self.memory.config(guardian_id),
            profile: self.router.guardian_profile(guardian_id),
            feedback_count: feedback.count,
            success_rate: feedback.success_rate,
            avg_reward: feedback.avg_reward,
            tokens: feedback.tokens,
            by_outcome: feedback.by_outcome,
            recent_feedback: self
                .recorder
                .by_guardian(guardian_id, Some(INSIGHT_RECENT_LIMIT)),
            memory_count: self
                .memory
                .guardian_stats(guardian_id)
                .map(|s| s.total_memories)
                .unwrap_or_default(),
        }
    }

    /// Renders a Markdown summary of the current state.
    ///
    /// Wall-clock values (uptime, latency) are left out, so identical state
    /// renders identical text.
    #[must_use]
    pub fn generate_report(&self) -> String {
        let stats = self.stats();
        let feedback = self.recorder.stats();
        let mut profiles = self.router.all_profiles();
        profiles.sort_by_key(|p| p.frequency);

        let mut out = String::from("# Guardian Cognition Report\n\n## Pipeline Statistics\n\n");
        out.push_str("| Metric | Value |\n|--------|-------|\n");
        let rows: [(&str, String); 7] = [
            ("Events Processed", stats.events_processed.to_string()),
            ("Trajectories Recorded", stats.trajectories_recorded.to_string()),
            ("Patterns Learned", stats.patterns_learned.to_string()),
            ("Tokens Tracked", stats.tokens_tracked.to_string()),
            ("Routing Decisions", stats.routing_decisions.to_string()),
            (
                "Avg Routing Confidence",
                format!("{:.1}%", stats.avg_routing_confidence * 100.0),
            ),
            ("Feedback Records", stats.feedback_records.to_string()),
        ];
        for (metric, value) in rows {
            let _ = writeln!(out, "| {metric} | {value} |");
        }

        out.push_str("\n## Feedback Summary\n\n| Outcome | Count |\n|---------|-------|\n");
        for outcome in [Outcome::Success, Outcome::Failure, Outcome::Partial] {
            let _ = writeln!(out, "| {outcome} | {} |", feedback.by_outcome.get(outcome));
        }
        let _ = writeln!(
            out,
            "\nSuccess rate: {:.1}%, average reward: {:.2}",
            feedback.success_rate * 100.0,
            feedback.avg_reward
        );

        out.push_str("\n## Guardian Profiles\n\n");
        out.push_str("| Guardian | Gate | Frequency | Tasks | Success Rate |\n");
        out.push_str("|----------|------|-----------|-------|--------------|\n");
        for p in &profiles {
            let _ = writeln!(
                out,
                "| {} | {} | {} Hz | {} | {:.0}% |",
                p.name,
                p.gate,
                p.frequency,
                p.total_tasks,
                p.success_rate() * 100.0
            );
        }
        out
    }

    /// Clears tasks, counters, event history, feedback and learned router
    /// statistics. Stored memories are kept.
    #[instrument(name = "guardian_cognition.pipeline.reset", skip(self))]
    pub fn reset(&self) {
        self.tasks().clear();
        *self.counters() = Counters::new();
        self.recorder.clear();
        self.router.reset();
        self.bus.clear();
        tracing::info!("pipeline reset");
    }

    /// Tears down Guardian memory (clearing `session` namespaces) and drops
    /// any in-flight tasks.
    #[instrument(name = "guardian_cognition.pipeline.shutdown", skip(self))]
    pub fn shutdown(&self) -> Result<()> {
        let abandoned = {
            let mut tasks = self.tasks();
            let n = tasks.len();
            tasks.clear();
            n
        };
        if abandoned > 0 {
            tracing::warn!(abandoned, "shutting down with tasks in flight");
        }
        self.memory.close()
    }
}
