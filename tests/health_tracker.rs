//! Failover policy tests for the provider health tracker.

mod common;

use common::{ScriptedLatency, FAST, SLOW};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use text_relay::provider::{AttemptKind, FixedLatency, HealthPolicy, HealthTracker, RoundRobinPicker};

#[tokio::test(start_paused = true)]
async fn test_three_providers_fail_over_on_threshold() {
    let tracker = common::tracker(3, 3, FixedLatency(SLOW));

    assert_eq!(tracker.record_attempt().await.kind, AttemptKind::Error);
    assert_eq!(tracker.record_attempt().await.kind, AttemptKind::Error);
    assert_eq!(tracker.snapshot().error_count, 2);

    let outcome = tracker.record_attempt().await;
    assert!(outcome.switched);
    assert_eq!(outcome.kind, AttemptKind::Failover);
    assert_eq!(outcome.provider_id, 2);
    assert_eq!(outcome.text, "Switched to Provider 2 due to errors");

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.active_index, 1);
    assert_eq!(snapshot.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failover_cycles_through_all_providers() {
    let tracker = common::tracker(3, 3, FixedLatency(SLOW));
    let mut notices = Vec::new();

    for _ in 0..12 {
        let outcome = tracker.record_attempt().await;
        if outcome.switched {
            notices.push(outcome.provider_id);
        }
    }

    assert_eq!(notices, vec![2, 3, 1, 2]);
    assert_eq!(tracker.snapshot().active_index, 1);
    assert_eq!(tracker.snapshot().failovers, 4);
}

#[tokio::test(start_paused = true)]
async fn test_single_provider_fails_over_to_itself() {
    let tracker = common::tracker(1, 3, FixedLatency(SLOW));

    tracker.record_attempt().await;
    tracker.record_attempt().await;
    let outcome = tracker.record_attempt().await;

    assert!(outcome.switched);
    assert_eq!(outcome.text, "Switched to Provider 1 due to errors");
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.active_index, 0);
    assert_eq!(snapshot.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_successful_attempt_leaves_state_untouched() {
    let latency = ScriptedLatency::new([SLOW, FAST, FAST], FAST);
    let tracker = common::tracker(3, 3, latency);

    tracker.record_attempt().await;
    let before = tracker.snapshot();
    assert_eq!(before.error_count, 1);

    for _ in 0..2 {
        let outcome = tracker.record_attempt().await;
        assert_eq!(outcome.kind, AttemptKind::Response);
        assert!(!outcome.switched);
        assert_eq!(tracker.snapshot(), before);
    }
}

#[tokio::test(start_paused = true)]
async fn test_errors_do_not_need_to_be_consecutive() {
    // A success in between does not reset the rolling error count.
    let latency = ScriptedLatency::new([SLOW, FAST, SLOW, FAST], SLOW);
    let tracker = common::tracker(2, 3, latency);

    for _ in 0..4 {
        assert!(!tracker.record_attempt().await.switched);
    }
    assert_eq!(tracker.snapshot().error_count, 2);
    assert!(tracker.record_attempt().await.switched);
}

#[tokio::test(start_paused = true)]
async fn test_response_comes_from_active_provider() {
    let latency = ScriptedLatency::new([SLOW, SLOW, SLOW], FAST);
    let tracker = common::tracker(3, 3, latency);

    for _ in 0..3 {
        tracker.record_attempt().await;
    }

    let outcome = tracker.record_attempt().await;
    assert_eq!(outcome.kind, AttemptKind::Response);
    assert_eq!(outcome.provider_id, 2);
    assert!(outcome.text.starts_with("p2-"));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_suspends_for_simulated_latency() {
    let tracker = common::tracker(1, 3, FixedLatency(Duration::from_millis(1500)));
    let start = tokio::time::Instant::now();
    tracker.record_attempt().await;
    assert!(start.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_interleaved_attempts_count_every_error() {
    let tracker = common::tracker(3, 3, FixedLatency(SLOW));

    let handles: Vec<_> = (0..9)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.record_attempt().await })
        })
        .collect();

    let mut switches = 0;
    for handle in handles {
        if handle.await.unwrap().switched {
            switches += 1;
        }
    }

    assert_eq!(switches, 3);
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.error_count, 0);
    assert_eq!(snapshot.active_index, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_stress_keeps_state_consistent() {
    const TASKS: usize = 32;
    const ATTEMPTS: usize = 50;
    const PROVIDERS: usize = 3;
    const THRESHOLD: u32 = 3;

    // Every attempt is an error: 1ms latency against a zero threshold.
    let tracker = HealthTracker::new(
        common::registry(PROVIDERS as u32),
        HealthPolicy {
            error_threshold: THRESHOLD,
            latency_threshold: Duration::ZERO,
        },
        Box::new(FixedLatency(Duration::from_millis(1))),
        Box::new(RoundRobinPicker::default()),
    );

    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let observer = {
        let tracker = tracker.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut observed = HashSet::new();
            loop {
                let snapshot = tracker.snapshot();
                assert!(snapshot.active_index < PROVIDERS);
                assert!(snapshot.error_count < THRESHOLD);
                observed.insert(snapshot.active_index);
                if done.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    let workers: Vec<_> = (0..TASKS)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let mut switches = 0u64;
                for _ in 0..ATTEMPTS {
                    if tracker.record_attempt().await.switched {
                        switches += 1;
                    }
                }
                switches
            })
        })
        .collect();

    let mut reported_switches = 0;
    for worker in workers {
        reported_switches += worker.await.unwrap();
    }
    done.store(true, std::sync::atomic::Ordering::SeqCst);
    let observed = observer.await.unwrap();
    assert!(!observed.is_empty());

    let total = (TASKS * ATTEMPTS) as u64;
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.failovers, total / THRESHOLD as u64);
    assert_eq!(reported_switches, snapshot.failovers);
    assert_eq!(snapshot.error_count as u64, total % THRESHOLD as u64);
    assert_eq!(
        snapshot.active_index,
        (snapshot.failovers % PROVIDERS as u64) as usize
    );
    assert_eq!(tracker.failover_log().len(), 100);
}
