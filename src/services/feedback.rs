//! Feedback ledger.
//!
//! Appends outcome observations to a capped ring buffer and keeps running
//! aggregates (global and per Guardian) in step with the retained window:
//! every append adds to the accumulators and every eviction subtracts from
//! them, so aggregate queries never rescan the ledger.

use crate::models::{Event, EventType, FeedbackRecord, FeedbackStats, Outcome, OutcomeCounts};
use crate::observability::EventBus;
use crate::ring_buffer::RingBuffer;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of records returned by [`FeedbackRecorder::recent_feedback`].
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    reward_sum: f64,
    tokens: u64,
    by_outcome: OutcomeCounts,
}

impl Accumulator {
    fn add(&mut self, record: &FeedbackRecord) {
        self.count += 1;
        self.reward_sum += record.reward;
        self.tokens = self.tokens.saturating_add(record.tokens_cost);
        *self.by_outcome.slot(record.outcome) += 1;
    }

    fn subtract(&mut self, record: &FeedbackRecord) {
        self.count = self.count.saturating_sub(1);
        self.tokens = self.tokens.saturating_sub(record.tokens_cost);
        let slot = self.by_outcome.slot(record.outcome);
        *slot = slot.saturating_sub(1);
        if self.count == 0 {
            // Drop accumulated float error with the last record.
            self.reward_sum = 0.0;
        } else {
            self.reward_sum -= record.reward;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.by_outcome.success as f64 / self.count as f64
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn avg_reward(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.reward_sum / self.count as f64
        }
    }
}

#[derive(Debug)]
struct Ledger {
    records: RingBuffer<FeedbackRecord>,
    totals: Accumulator,
    by_guardian: HashMap<String, Accumulator>,
}

impl Ledger {
    fn new(capacity: usize) -> Self {
        Self {
            records: RingBuffer::new(capacity),
            totals: Accumulator::default(),
            by_guardian: HashMap::new(),
        }
    }

    fn scope(&self, guardian_id: Option<&str>) -> Accumulator {
        match guardian_id {
            Some(id) => self.by_guardian.get(id).copied().unwrap_or_default(),
            None => self.totals,
        }
    }
}

/// Aggregates for one Guardian over the retained window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuardianFeedback {
    /// Retained records.
    pub count: usize,
    /// Success rate (0 when empty).
    pub success_rate: f64,
    /// Mean reward (0 when empty).
    pub avg_reward: f64,
    /// Tokens spent.
    pub tokens: u64,
    /// Records per outcome.
    pub by_outcome: OutcomeCounts,
}

/// Bounded feedback ledger with per-Guardian aggregates.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::{EventBus, FeedbackRecord, FeedbackRecorder, Outcome};
///
/// let recorder = FeedbackRecorder::new(100, EventBus::default());
/// recorder.record(FeedbackRecord::new("task-1", "lyria", "debug", Outcome::Success, 1.0));
/// assert!((recorder.success_rate(Some("lyria")) - 1.0).abs() < f64::EPSILON);
/// assert_eq!(recorder.avg_reward(Some("draconia")), 0.0);
/// ```
#[derive(Debug)]
pub struct FeedbackRecorder {
    ledger: Mutex<Ledger>,
    bus: EventBus,
}

impl FeedbackRecorder {
    /// Creates a recorder retaining at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize, bus: EventBus) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new(capacity)),
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record, evicting the oldest one if the ledger is full.
    ///
    /// Emits `feedback-recorded` then `success-rate-changed`. A record with a
    /// non-finite reward is dropped, since it would poison the running sums.
    pub fn record(&self, record: FeedbackRecord) {
        if !record.reward.is_finite() {
            tracing::warn!(
                guardian_id = %record.guardian_id,
                event_id = %record.event_id,
                reward = record.reward,
                "dropping feedback with non-finite reward"
            );
            metrics::counter!("feedback_rejected_total").increment(1);
            return;
        }

        let (success_rate, guardian_total) = {
            let mut ledger = self.lock();
            if let Some(evicted) = ledger.records.push(record.clone()) {
                ledger.totals.subtract(&evicted);
                if let Some(acc) = ledger.by_guardian.get_mut(&evicted.guardian_id) {
                    acc.subtract(&evicted);
                    if acc.count == 0 {
                        ledger.by_guardian.remove(&evicted.guardian_id);
                    }
                }
                metrics::counter!("feedback_evicted_total").increment(1);
            }
            ledger.totals.add(&record);
            let acc = ledger
                .by_guardian
                .entry(record.guardian_id.clone())
                .or_default();
            acc.add(&record);
            (acc.success_rate(), acc.count)
        };

        metrics::counter!("feedback_record_total", "outcome" => record.outcome.as_str())
            .increment(1);
        tracing::debug!(
            guardian_id = %record.guardian_id,
            outcome = %record.outcome,
            reward = record.reward,
            "feedback recorded"
        );

        let guardian_id = record.guardian_id.clone();
        let payload = serde_json::to_value(&record).unwrap_or_else(|_| json!({}));
        self.bus.emit_event(
            Event::new(EventType::FeedbackRecorded, payload).with_guardian(guardian_id.clone()),
        );
        self.bus.emit_event(
            Event::new(
                EventType::SuccessRateChanged,
                json!({
                    "guardianId": guardian_id,
                    "successRate": success_rate,
                    "total": guardian_total,
                }),
            )
            .with_guardian(guardian_id),
        );
    }

    /// Records for one Guardian, most recent first.
    #[must_use]
    pub fn by_guardian(&self, guardian_id: &str, limit: Option<usize>) -> Vec<FeedbackRecord> {
        self.lock()
            .records
            .newest_matching(limit.unwrap_or(usize::MAX), |r| r.guardian_id == guardian_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Records with one outcome, most recent first.
    #[must_use]
    pub fn by_outcome(&self, outcome: Outcome, limit: Option<usize>) -> Vec<FeedbackRecord> {
        self.lock()
            .records
            .newest_matching(limit.unwrap_or(usize::MAX), |r| r.outcome == outcome)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The most recent records, most recent first. Defaults to 10.
    #[must_use]
    pub fn recent_feedback(&self, limit: Option<usize>) -> Vec<FeedbackRecord> {
        self.lock()
            .records
            .newest_matching(limit.unwrap_or(DEFAULT_RECENT_LIMIT), |_| true)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Success rate globally or for one Guardian; 0 without records.
    #[must_use]
    pub fn success_rate(&self, guardian_id: Option<&str>) -> f64 {
        self.lock().scope(guardian_id).success_rate()
    }

    /// Mean reward globally or for one Guardian; 0 without records.
    #[must_use]
    pub fn avg_reward(&self, guardian_id: Option<&str>) -> f64 {
        self.lock().scope(guardian_id).avg_reward()
    }

    /// Aggregates for one Guardian; zeroed without records.
    #[must_use]
    pub fn guardian_feedback(&self, guardian_id: &str) -> GuardianFeedback {
        let acc = self.lock().scope(Some(guardian_id));
        GuardianFeedback {
            count: acc.count,
            success_rate: acc.success_rate(),
            avg_reward: acc.avg_reward(),
            tokens: acc.tokens,
            by_outcome: acc.by_outcome,
        }
    }

    /// Global statistics.
    #[must_use]
    pub fn stats(&self) -> FeedbackStats {
        let ledger = self.lock();
        FeedbackStats {
            total: ledger.totals.count,
            success_rate: ledger.totals.success_rate(),
            avg_reward: ledger.totals.avg_reward(),
            guardian_count: ledger.by_guardian.len(),
            by_outcome: ledger.totals.by_outcome,
        }
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record and aggregate.
    pub fn clear(&self) {
        let mut ledger = self.lock();
        let capacity = ledger.records.capacity();
        *ledger = Ledger::new(capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(guardian: &str, outcome: Outcome, reward: f64) -> FeedbackRecord {
        FeedbackRecord::new("evt", guardian, "task", outcome, reward)
    }

    #[test]
    fn test_empty_rates_are_zero() {
        let recorder = FeedbackRecorder::new(10, EventBus::default());
        assert!(recorder.success_rate(None).abs() < f64::EPSILON);
        assert!(recorder.avg_reward(None).abs() < f64::EPSILON);
        assert!(recorder.success_rate(Some("lyria")).abs() < f64::EPSILON);
        assert!(recorder.avg_reward(Some("lyria")).abs() < f64::EPSILON);
        assert!(!recorder.success_rate(Some("lyria")).is_nan());
    }

    #[test]
    fn test_aggregates() {
        let recorder = FeedbackRecorder::new(10, EventBus::default());
        recorder.record(feedback("lyria", Outcome::Success, 1.0));
        recorder.record(feedback("lyria", Outcome::Failure, -1.0));
        recorder.record(feedback("lyria", Outcome::Success, 1.0));
        recorder.record(feedback("draconia", Outcome::Partial, 0.5));

        assert!((recorder.success_rate(Some("lyria")) - 2.0 / 3.0).abs() < 1e-9);
        assert!((recorder.avg_reward(Some("lyria")) - 1.0 / 3.0).abs() < 1e-9);
        assert!((recorder.success_rate(None) - 0.5).abs() < 1e-9);

        let stats = recorder.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.guardian_count, 2);
        assert_eq!(stats.by_outcome.success, 2);
        assert_eq!(stats.by_outcome.failure, 1);
        assert_eq!(stats.by_outcome.partial, 1);
    }

    #[test]
    fn test_queries_are_newest_first_and_bounded() {
        let recorder = FeedbackRecorder::new(100, EventBus::default());
        for i in 0..5 {
            recorder.record(
                FeedbackRecord::new(format!("evt-{i}"), "lyria", "task", Outcome::Success, 1.0)
                    .with_timestamp(i + 1),
            );
        }
        recorder.record(feedback("draconia", Outcome::Failure, -1.0));

        let lyria = recorder.by_guardian("lyria", Some(2));
        let ids: Vec<&str> = lyria.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["evt-4", "evt-3"]);

        assert_eq!(recorder.by_outcome(Outcome::Failure, None).len(), 1);
        assert_eq!(recorder.recent_feedback(None).len(), 6);
        assert_eq!(recorder.recent_feedback(Some(1))[0].guardian_id, "draconia");
    }

    #[test]
    fn test_recent_feedback_defaults_to_ten() {
        let recorder = FeedbackRecorder::new(100, EventBus::default());
        for _ in 0..15 {
            recorder.record(feedback("ino", Outcome::Success, 1.0));
        }
        assert_eq!(recorder.recent_feedback(None).len(), DEFAULT_RECENT_LIMIT);
    }

    #[test]
    fn test_eviction_keeps_aggregates_in_window() {
        let recorder = FeedbackRecorder::new(2, EventBus::default());
        recorder.record(feedback("lyria", Outcome::Failure, -1.0));
        recorder.record(feedback("draconia", Outcome::Success, 1.0));
        recorder.record(feedback("draconia", Outcome::Success, 1.0));

        assert_eq!(recorder.len(), 2);
        let stats = recorder.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.guardian_count, 1);
        assert_eq!(stats.by_outcome.failure, 0);
        assert!((recorder.success_rate(None) - 1.0).abs() < f64::EPSILON);
        assert!(recorder.avg_reward(Some("lyria")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_finite_reward_is_dropped() {
        let bus = EventBus::new(100);
        let recorder = FeedbackRecorder::new(2, bus.clone());
        recorder.record(feedback("lyria", Outcome::Success, f64::NAN));
        recorder.record(feedback("lyria", Outcome::Success, f64::INFINITY));
        recorder.record(feedback("lyria", Outcome::Failure, f64::NEG_INFINITY));
        assert!(recorder.is_empty());
        assert!(bus.history(None).is_empty());

        recorder.record(feedback("lyria", Outcome::Success, 1.0));
        recorder.record(feedback("lyria", Outcome::Success, 1.0));
        recorder.record(feedback("lyria", Outcome::Success, f64::NAN));
        recorder.record(feedback("lyria", Outcome::Success, 1.0));

        assert_eq!(recorder.len(), 2);
        assert!((recorder.avg_reward(Some("lyria")) - 1.0).abs() < f64::EPSILON);
        assert!((recorder.avg_reward(None) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_emits_events() {
        let bus = EventBus::new(100);
        let recorder = FeedbackRecorder::new(10, bus.clone());
        recorder.record(feedback("alera", Outcome::Success, 1.0));

        let types: Vec<EventType> = bus.history(None).iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::FeedbackRecorded, EventType::SuccessRateChanged]
        );
        let change = &bus.history_by_type(EventType::SuccessRateChanged, None)[0];
        assert_eq!(change.guardian_id.as_deref(), Some("alera"));
        assert_eq!(change.payload["successRate"], json!(1.0));
    }

    #[test]
    fn test_guardian_feedback_and_clear() {
        let recorder = FeedbackRecorder::new(10, EventBus::default());
        recorder.record(feedback("elara", Outcome::Success, 1.0).with_tokens(40));
        recorder.record(feedback("elara", Outcome::Failure, -1.0).with_tokens(60));

        let summary = recorder.guardian_feedback("elara");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.tokens, 100);
        assert!(summary.avg_reward.abs() < f64::EPSILON);

        recorder.clear();
        assert!(recorder.is_empty());
        assert_eq!(recorder.guardian_feedback("elara"), GuardianFeedback::default());
    }
}
