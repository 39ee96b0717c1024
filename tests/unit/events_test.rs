//! Tests for the transition sink

use gang_controller::core::{
    GroupKey, InMemoryTransitionSink, Phase, PhaseRule, TransitionEvent, TransitionSink,
};

fn event(name: &str, from: Phase, to: Phase) -> TransitionEvent {
    TransitionEvent::new(GroupKey::new("default", name), from, to, PhaseRule::MembersRunning, 7)
}

#[test]
fn test_sink_keeps_most_recent() {
    let mut sink = InMemoryTransitionSink::new(2);
    sink.record(event("a", Phase::Pending, Phase::PreScheduling));
    sink.record(event("b", Phase::Scheduled, Phase::Running));
    sink.record(event("c", Phase::Running, Phase::Finished));

    let names: Vec<String> = sink.events().into_iter().map(|e| e.group.name).collect();
    assert_eq!(names, vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn test_events_for_filters_by_group() {
    let mut sink = InMemoryTransitionSink::new(10);
    sink.record(event("a", Phase::Scheduled, Phase::Running));
    sink.record(event("b", Phase::Scheduled, Phase::Running));
    sink.record(event("a", Phase::Running, Phase::Finished));

    let a = sink.events_for(&GroupKey::new("default", "a"));
    assert_eq!(a.len(), 2);
    assert_eq!(a[1].to, Phase::Finished);
}

#[test]
fn test_event_serializes() {
    let json = serde_json::to_value(event("a", Phase::Scheduled, Phase::Running)).unwrap();
    assert_eq!(json["resource_version"], 7);
    assert!(json["recorded_at_ms"].as_u64().unwrap() > 0);
}
