//! Batch caps and prefetch limits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pull_consumer::{Flags, StopReason};
use rstest::rstest;

use crate::support::{fill, harness, Recorder};

// ============================================================================
// Prefetch limit
// ============================================================================

#[test]
fn prefetch_limit_halts_before_next_fetch() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(2).unwrap();
    fill(&h.queue, 5);
    let recorder = Recorder::new();
    recorder.attach(&h.consumer);

    let report = h.consumer.tick().unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.stop, StopReason::PrefetchLimit);
    assert_eq!(recorder.payloads(), vec!["msg-0", "msg-1"]);
    assert_eq!(h.consumer.outstanding(), 2);
    // No third fetch was attempted.
    assert_eq!(h.queue.fetch_count(), 2);
    assert_eq!(h.queue.len(), 3);
}

#[test]
fn tick_at_limit_fetches_nothing() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(2).unwrap();
    fill(&h.queue, 5);

    h.consumer.tick().unwrap();
    let fetches = h.queue.fetch_count();

    let report = h.consumer.tick().unwrap();
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.stop, StopReason::PrefetchLimit);
    assert_eq!(h.queue.fetch_count(), fetches);
    assert_eq!(h.consumer.outstanding(), 2);
}

#[test]
fn message_reaching_limit_counts_against_current_tick() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(3).unwrap();
    fill(&h.queue, 3);

    // Exactly enough messages to hit the limit: the tick stops on the gate
    // after the third dispatch rather than trying a fourth fetch.
    let report = h.consumer.tick().unwrap();
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.stop, StopReason::PrefetchLimit);
    assert_eq!(h.queue.fetch_count(), 3);

    // The next tick sees a full window even though the queue is now empty.
    fill(&h.queue, 1);
    let report = h.consumer.tick().unwrap();
    assert_eq!(report.dispatched, 0);
    assert_eq!(h.queue.fetch_count(), 3);
}

#[test]
fn settling_outside_tick_frees_capacity_for_next_tick() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(2).unwrap();
    fill(&h.queue, 5);
    let recorder = Recorder::new();
    recorder.attach(&h.consumer);

    h.consumer.tick().unwrap();
    let first = recorder.messages()[0].clone();
    assert!(h.consumer.acknowledge(&first, Flags::NONE).unwrap());
    assert_eq!(h.consumer.outstanding(), 1);

    let report = h.consumer.tick().unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(recorder.payloads(), vec!["msg-0", "msg-1", "msg-2"]);
    assert_eq!(h.consumer.outstanding(), 2);
}

#[test]
fn synchronous_reject_keeps_tick_going() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(1).unwrap();
    fill(&h.queue, 5);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    h.consumer.on_message(move |received| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(received.consumer().outstanding(), 1);
        assert!(received.reject(Flags::NONE)?);
        assert_eq!(received.consumer().outstanding(), 0);
        Ok(())
    });

    let report = h.consumer.tick().unwrap();

    assert_eq!(report.dispatched, 5);
    assert_eq!(report.stop, StopReason::Drained);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert_eq!(h.queue.rejected().len(), 5);
    assert_eq!(h.consumer.outstanding(), 0);
}

#[test]
fn outstanding_never_exceeds_limit() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(3).unwrap();
    fill(&h.queue, 20);

    let violated = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&violated);
    let n = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&n);
    h.consumer.on_message(move |received| {
        let consumer = received.consumer();
        if consumer.outstanding() > consumer.prefetch_limit() {
            flag.store(true, Ordering::SeqCst);
        }
        // Settle every other message.
        if count.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            received.ack(Flags::NONE)?;
        }
        Ok(())
    });

    for _ in 0..10 {
        h.scheduler.run_once();
        assert!(h.consumer.outstanding() <= 3);
    }
    assert!(!violated.load(Ordering::SeqCst));
}

#[test]
fn lowering_limit_is_not_retroactive() {
    let h = harness(None);
    h.consumer.set_prefetch_limit(3).unwrap();
    fill(&h.queue, 6);
    let recorder = Recorder::new();
    recorder.attach(&h.consumer);

    h.consumer.tick().unwrap();
    assert_eq!(h.consumer.outstanding(), 3);

    h.consumer.set_prefetch_limit(1).unwrap();
    assert_eq!(h.consumer.outstanding(), 3);
    assert_eq!(h.consumer.tick().unwrap().dispatched, 0);

    let delivered = recorder.messages();
    h.consumer.acknowledge(&delivered[0], Flags::NONE).unwrap();
    h.consumer.acknowledge(&delivered[1], Flags::NONE).unwrap();
    assert_eq!(h.consumer.tick().unwrap().dispatched, 0);

    h.consumer.acknowledge(&delivered[2], Flags::NONE).unwrap();
    assert_eq!(h.consumer.tick().unwrap().dispatched, 1);
}

#[test]
fn unbounded_prefetch_does_not_track_outstanding() {
    let h = harness(None);
    fill(&h.queue, 4);

    let report = h.consumer.tick().unwrap();

    assert_eq!(report.dispatched, 4);
    assert_eq!(h.consumer.outstanding(), 0);
}

// ============================================================================
// Per-tick batch cap
// ============================================================================

#[test]
fn batch_cap_splits_backlog_across_ticks() {
    let h = harness(Some(3));
    fill(&h.queue, 5);
    let recorder = Recorder::new();
    recorder.attach(&h.consumer);

    let first = h.scheduler.run_once().remove(0).unwrap();
    assert_eq!(first.dispatched, 3);
    assert_eq!(first.stop, StopReason::BatchLimit);
    assert_eq!(h.consumer.outstanding(), 0);
    assert_eq!(h.queue.len(), 2);

    let second = h.scheduler.run_once().remove(0).unwrap();
    assert_eq!(second.dispatched, 2);
    assert_eq!(second.stop, StopReason::Drained);
    assert_eq!(recorder.len(), 5);
}

#[rstest]
#[case::cap_below_backlog(2, 7)]
#[case::cap_equals_backlog(4, 4)]
#[case::cap_above_backlog(10, 3)]
#[case::cap_of_one(1, 5)]
fn never_dispatches_more_than_cap(#[case] cap: usize, #[case] backlog: usize) {
    let h = harness(Some(cap));
    fill(&h.queue, backlog);
    let recorder = Recorder::new();
    recorder.attach(&h.consumer);

    let mut total = 0;
    while total < backlog {
        let report = h.consumer.tick().unwrap();
        assert!(report.dispatched <= cap);
        assert!(report.dispatched > 0);
        total += report.dispatched;
    }
    assert_eq!(recorder.len(), backlog);
}

#[rstest]
#[case::batch_cap_first(2, 5, StopReason::BatchLimit)]
#[case::prefetch_first(5, 2, StopReason::PrefetchLimit)]
fn tighter_limit_wins(#[case] cap: usize, #[case] prefetch: i64, #[case] expected: StopReason) {
    let h = harness(Some(cap));
    h.consumer.set_prefetch_limit(prefetch).unwrap();
    fill(&h.queue, 10);

    let report = h.consumer.tick().unwrap();

    assert_eq!(report.dispatched, cap.min(prefetch as usize));
    assert_eq!(report.stop, expected);
}
