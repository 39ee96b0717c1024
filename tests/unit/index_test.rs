//! Tests for the member index

use gang_controller::core::{
    GroupKey, Member, MemberIndex, MemberPhase, ObjectMeta, WatchEvent, DEFAULT_GROUP_LABEL,
};

fn member(name: &str, group: &str, phase: MemberPhase, version: u64) -> Member {
    let mut m = Member::new(ObjectMeta::new("default", name, 0), DEFAULT_GROUP_LABEL, group, phase);
    m.meta.resource_version = version;
    m
}

#[test]
fn test_histogram_follows_member_phases() {
    let index = MemberIndex::new(DEFAULT_GROUP_LABEL);
    let pg = GroupKey::new("default", "pg");

    index.apply(&WatchEvent::Added(member("a", "pg", MemberPhase::Pending, 1)));
    index.apply(&WatchEvent::Added(member("b", "pg", MemberPhase::Running, 2)));
    index.apply(&WatchEvent::Modified(member("a", "pg", MemberPhase::Succeeded, 3)));

    let h = index.histogram(&pg);
    assert_eq!(h.total(), 2);
    assert_eq!(h.running, 1);
    assert_eq!(h.succeeded, 1);
    assert_eq!(h.pending, 0);
}

#[test]
fn test_out_of_order_update_is_ignored() {
    let index = MemberIndex::new(DEFAULT_GROUP_LABEL);
    let newer = member("a", "pg", MemberPhase::Failed, 5);
    index.upsert(&newer);

    let touched = index.upsert(&member("a", "pg", MemberPhase::Running, 4));
    assert!(touched.is_empty());
    assert_eq!(index.phase_of(&newer.key()), Some(MemberPhase::Failed));
}

#[test]
fn test_label_move_touches_both_groups() {
    let index = MemberIndex::new(DEFAULT_GROUP_LABEL);
    index.upsert(&member("a", "old", MemberPhase::Running, 1));

    let touched = index.upsert(&member("a", "new", MemberPhase::Running, 2));
    assert_eq!(
        touched,
        vec![GroupKey::new("default", "old"), GroupKey::new("default", "new")]
    );
    assert_eq!(index.histogram(&GroupKey::new("default", "old")).total(), 0);
    assert_eq!(index.histogram(&GroupKey::new("default", "new")).total(), 1);
}

#[test]
fn test_delete_removes_member() {
    let index = MemberIndex::new(DEFAULT_GROUP_LABEL);
    let m = member("a", "pg", MemberPhase::Running, 1);
    index.upsert(&m);

    let mut gone = m.clone();
    gone.meta.resource_version = 2;
    let touched = index.apply(&WatchEvent::Deleted(gone));
    assert_eq!(touched, vec![GroupKey::new("default", "pg")]);
    assert_eq!(index.member_count(), 0);
    assert!(index.members_of(&GroupKey::new("default", "pg")).is_empty());
}

#[test]
fn test_unknown_group_has_empty_histogram() {
    let index = MemberIndex::new(DEFAULT_GROUP_LABEL);
    assert_eq!(index.histogram(&GroupKey::new("default", "nobody")).total(), 0);
}
