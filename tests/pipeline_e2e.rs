//! End-to-end tests for the task lifecycle pipeline.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]

use guardian_cognition::models::{GuardianConfig, RetentionPolicy};
use guardian_cognition::{
    CognitionConfig, EventType, FeedbackRecord, IntelligencePipeline, Outcome, PipelineFeatures,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn pipeline() -> IntelligencePipeline {
    IntelligencePipeline::new(CognitionConfig::default()).expect("default config is valid")
}

#[test]
fn test_performance_task_routes_to_fire_and_records_one_success() {
    let pipeline = pipeline();

    let task_id = pipeline.on_task_start("optimize the performance of the query", None);
    let start = pipeline.event_bus().history_by_type(EventType::TaskStart, None);
    assert_eq!(start[0].guardian_id.as_deref(), Some("draconia"));

    pipeline.on_task_complete(&task_id, json!({"plan": "index scan"}), Some(500));

    let records = pipeline.recorder().by_guardian("draconia", None);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.outcome, Outcome::Success);
    assert_eq!(record.reward, 1.0);
    assert_eq!(record.tokens_cost, 500);
    assert_eq!(record.action, "optimize the performance of the query");

    let insight = pipeline.guardian_insight("draconia");
    assert_eq!(insight.feedback_count, 1);
    assert_eq!(insight.success_rate, 1.0);
    assert_eq!(insight.profile.map(|p| p.total_tasks), Some(1));
}

#[test]
fn test_lifecycle_event_order() {
    let pipeline = pipeline();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pipeline
        .event_bus()
        .on_all(move |event| sink.lock().unwrap().push(event.event_type));

    let task_id = pipeline.on_task_start("optimize the query", None);
    pipeline.on_task_complete(&task_id, json!(null), Some(1));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            EventType::TaskStart,
            EventType::TaskComplete,
            EventType::FeedbackRecorded,
            EventType::SuccessRateChanged,
            EventType::LearningCycle,
            EventType::MemoryStored,
        ]
    );
}

#[test]
fn test_listener_may_read_pipeline_state() {
    let pipeline = Arc::new(pipeline());
    let observed = Arc::new(Mutex::new(None));
    let (p, out) = (Arc::downgrade(&pipeline), Arc::clone(&observed));
    pipeline
        .event_bus()
        .on_event(EventType::LearningCycle, move |_| {
            if let Some(p) = p.upgrade() {
                *out.lock().unwrap() = Some(p.stats().patterns_learned);
            }
        });

    let task_id = pipeline.on_task_start("design the api", None);
    pipeline.on_task_complete(&task_id, json!(null), None);
    assert_eq!(*observed.lock().unwrap(), Some(1));
}

#[test]
fn test_confidence_tracks_outcomes_for_routed_tasks() {
    let pipeline = pipeline();
    let query = "optimize the query";
    let baseline = pipeline.route_task(query).confidence;

    for _ in 0..3 {
        let task_id = pipeline.on_task_start(query, None);
        pipeline.on_task_complete(&task_id, json!(null), None);
    }
    let after_successes = pipeline.route_task(query).confidence;
    assert!(after_successes >= baseline);

    for _ in 0..6 {
        let task_id = pipeline.on_task_start(query, None);
        pipeline.on_task_fail(&task_id, "regression", None);
    }
    let after_failures = pipeline.route_task(query).confidence;
    assert!(after_failures <= after_successes);
    assert!(after_failures > 0.0);
}

#[test]
fn test_external_feedback_does_not_touch_router() {
    let pipeline = pipeline();
    pipeline.record_feedback(
        FeedbackRecord::new("evt_ext", "lyria", "review", Outcome::Partial, 0.5).with_tokens(20),
    );

    assert_eq!(pipeline.recorder().by_outcome(Outcome::Partial, None).len(), 1);
    assert_eq!(pipeline.router().stats().outcomes_recorded, 0);
    assert_eq!(pipeline.guardian_insight("lyria").avg_reward, 0.5);
}

#[test]
fn test_extension_guardian_is_reachable_explicitly() {
    let config = CognitionConfig::default().with_guardian(GuardianConfig::new(
        "vesper",
        "Vesper",
        "Dusk",
        1234,
        "Shadow",
        RetentionPolicy::Session,
    ));
    let pipeline = IntelligencePipeline::new(config).unwrap();

    let task_id = pipeline.on_task_start("night watch", Some("vesper"));
    pipeline.on_task_complete(&task_id, json!(null), None);

    let insight = pipeline.guardian_insight("vesper");
    assert!(insight.config.is_some());
    assert_eq!(insight.memory_count, 1);

    pipeline.shutdown().unwrap();
    assert_eq!(pipeline.guardian_insight("vesper").memory_count, 0);
}

#[test]
fn test_report_reflects_activity() {
    let config = CognitionConfig::default()
        .with_features(PipelineFeatures::all().with_memory_persistence(false));
    let pipeline = IntelligencePipeline::new(config).unwrap();

    let ok = pipeline.on_task_start("database schema", None);
    pipeline.on_task_complete(&ok, json!(null), Some(100));
    let bad = pipeline.on_task_start("database migration", None);
    pipeline.on_task_fail(&bad, "lock timeout", Some(50));

    let report = pipeline.generate_report();
    assert!(report.contains("| Tokens Tracked | 150 |"));
    assert!(report.contains("| success | 1 |"));
    assert!(report.contains("| failure | 1 |"));
    assert!(report.contains("| Lyssandria | Foundation | 174 Hz | 2 | 50% |"));
}
