//! Tests for the rate-limited work queue

use gang_controller::core::{ExponentialBackoff, WorkQueue};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_duplicate_adds_collapse() {
    let q = WorkQueue::default();
    q.add("a");
    q.add("a");
    q.add("b");
    assert_eq!(q.len(), 2);
}

#[test]
fn test_key_added_while_processing_is_requeued_on_done() {
    let q = WorkQueue::default();
    q.add("a");
    let key = q.get().unwrap();
    q.add("a");
    assert!(q.is_empty());

    q.done(&key);
    assert_eq!(q.len(), 1);
}

#[test]
fn test_rate_limited_add_waits_for_backoff() {
    let q = WorkQueue::new(ExponentialBackoff::new(
        Duration::from_millis(20),
        Duration::from_millis(100),
    ));
    let delay = q.add_rate_limited("a");
    assert_eq!(delay, Duration::from_millis(20));
    assert_eq!(q.num_requeues(&"a"), 1);

    let start = Instant::now();
    assert_eq!(q.get(), Some("a"));
    assert!(start.elapsed() >= Duration::from_millis(15));

    q.forget(&"a");
    assert_eq!(q.num_requeues(&"a"), 0);
}

#[test]
fn test_shutdown_wakes_blocked_getter() {
    let q: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::default());
    let getter = {
        let q = Arc::clone(&q);
        thread::spawn(move || q.get())
    };
    thread::sleep(Duration::from_millis(20));
    q.shutdown();
    assert_eq!(getter.join().unwrap(), None);
    assert!(q.is_shutting_down());
}

#[test]
fn test_backoff_doubles_and_caps() {
    let b = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_millis(30));
    assert_eq!(b.delay(1), Duration::from_millis(5));
    assert_eq!(b.delay(2), Duration::from_millis(10));
    assert_eq!(b.delay(3), Duration::from_millis(20));
    assert_eq!(b.delay(4), Duration::from_millis(30));
    assert_eq!(b.delay(40), Duration::from_millis(30));
}
