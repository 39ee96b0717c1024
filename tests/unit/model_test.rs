//! Tests for the object model

use gang_controller::core::{
    Group, GroupKey, LabelSelector, Member, MemberPhase, ObjectMeta, Phase, WatchEvent,
    DEFAULT_GROUP_LABEL,
};
use std::collections::BTreeMap;

#[test]
fn test_member_group_from_label() {
    let meta = ObjectMeta::new("batch", "pod", 0);
    let m = Member::new(meta, DEFAULT_GROUP_LABEL, "pg", MemberPhase::Pending);
    assert_eq!(m.group_key(DEFAULT_GROUP_LABEL), Some(GroupKey::new("batch", "pg")));
    assert_eq!(m.group_key("other-label"), None);
}

#[test]
fn test_empty_label_value_means_no_group() {
    let meta = ObjectMeta::new("batch", "pod", 0);
    let m = Member::new(meta, DEFAULT_GROUP_LABEL, "", MemberPhase::Pending);
    assert_eq!(m.group_key(DEFAULT_GROUP_LABEL), None);
}

#[test]
fn test_label_selector() {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), "trainer".to_string());

    assert!(LabelSelector::All.matches(&labels));
    assert!(LabelSelector::Exists("app".into()).matches(&labels));
    assert!(!LabelSelector::Exists("tier".into()).matches(&labels));
    assert!(LabelSelector::Equals("app".into(), "trainer".into()).matches(&labels));
    assert!(!LabelSelector::Equals("app".into(), "server".into()).matches(&labels));
}

#[test]
fn test_new_group_defaults() {
    let g = Group::new(ObjectMeta::new("default", "pg", 10), 3);
    assert_eq!(g.spec.min_member, 3);
    assert_eq!(g.status.phase, Phase::Pending);
    assert_eq!(g.status.scheduled_count, 0);
    assert_eq!(g.key(), GroupKey::new("default", "pg"));
}

#[test]
fn test_distinct_uids() {
    let a = ObjectMeta::new("default", "a", 0);
    let b = ObjectMeta::new("default", "a", 0);
    assert_ne!(a.uid, b.uid);
}

#[test]
fn test_watch_event_accessors() {
    let g = Group::new(ObjectMeta::new("default", "pg", 0), 1);
    let event = WatchEvent::Deleted(g.clone());
    assert_eq!(event.kind(), "deleted");
    assert_eq!(event.object(), &g);
}

#[test]
fn test_group_serde() {
    let g = Group::new(ObjectMeta::new("default", "pg", 0), 2).with_phase(Phase::Scheduling);
    let json = serde_json::to_string(&g).unwrap();
    let back: Group = serde_json::from_str(&json).unwrap();
    assert_eq!(back, g);
}
