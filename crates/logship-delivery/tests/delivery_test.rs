//! Delivery gate behavior against mock transports.
//!
//! Timer-driven cases run on a paused clock, so `sleep` advances virtual
//! time and every fire is deterministic.

mod common;

use common::{gate, memory_store, plain_destination, BrokenStore, MockTransport, PAYLOAD};
use logship_cache::{CacheStore, SqliteCacheStore};
use logship_delivery::{DeliveryError, DeliveryGate, FlushSkip, GateConfig, Outcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

/// A failed submission is cached and a forced flush drains it once the
/// collector is back.
#[tokio::test(start_paused = true)]
async fn failed_submit_is_cached_then_force_flushed() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let result = gate.submit(&plain_destination(), PAYLOAD).await;
    assert!(matches!(result, Err(DeliveryError::CachedAfterError { .. })));
    assert_eq!(Outcome::of(&result), Outcome::Queued);
    assert!(gate.has_pending().unwrap());
    assert!(gate.is_timer_armed());

    transport.set_failing(false);
    let report = gate.flush().await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);
    assert!(!gate.has_pending().unwrap());
    assert!(!gate.is_timer_armed());

    let delivered = transport.delivered();
    assert_eq!(delivered, vec![(plain_destination(), PAYLOAD.to_vec())]);
}

/// With a 2 s period the cache drains on its own within 3 s.
#[tokio::test(start_paused = true)]
async fn timer_drains_cache_after_one_period() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    transport.set_failing(false);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!gate.has_pending().unwrap());
}

/// An always-failing collector never loses the entry.
#[tokio::test(start_paused = true)]
async fn entry_survives_when_collector_stays_down() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(gate.has_pending().unwrap());
    assert_eq!(gate.pending_count().unwrap(), 1);
    assert_eq!(transport.calls(), 2);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Every failed submission adds exactly one entry, duplicates included.
#[tokio::test(start_paused = true)]
async fn each_failure_adds_exactly_one_entry() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    for expected in 1..=3 {
        let result = gate.submit(&plain_destination(), PAYLOAD).await;
        assert!(result.unwrap_err().is_cached());
        assert_eq!(gate.pending_count().unwrap(), expected);
        assert!(gate.has_pending().unwrap());
    }
}

/// Successful submissions never touch the cache or the timer.
#[tokio::test(start_paused = true)]
async fn successful_submit_leaves_cache_alone() {
    let transport = MockTransport::succeeding();
    let gate = gate(&transport, memory_store(), PERIOD);

    let response = gate.submit(&plain_destination(), PAYLOAD).await.unwrap();
    assert_eq!(response.status, Some(202));
    assert!(!gate.has_pending().unwrap());
    assert!(!gate.is_timer_armed());
}

/// Concurrent failures arm a single timer: one period later each entry has
/// been retried exactly once.
#[tokio::test(start_paused = true)]
async fn concurrent_failures_arm_one_timer() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let handles: Vec<_> = (0..10)
        .map(|i| gate.submit_detached(plain_destination(), format!("{{\"n\":{i}}}").into_bytes()))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap_err().is_cached());
    }
    assert_eq!(gate.pending_count().unwrap(), 10);
    assert!(gate.is_timer_armed());

    tokio::time::sleep(PERIOD + Duration::from_millis(100)).await;
    assert_eq!(transport.calls(), 20);
    assert_eq!(gate.pending_count().unwrap(), 10);
}

/// A forced flush that succeeds removes the entry.
#[tokio::test(start_paused = true)]
async fn flush_success_removes_entry() {
    let store = memory_store();
    store.add(&plain_destination(), PAYLOAD).unwrap();
    let transport = MockTransport::succeeding();
    let gate = gate(&transport, store, PERIOD);

    let report = gate.flush().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped, None);
    assert!(!gate.has_pending().unwrap());
}

/// A forced flush that fails keeps the same entry.
#[tokio::test(start_paused = true)]
async fn flush_failure_retains_entry() {
    let store = memory_store();
    store.add(&plain_destination(), PAYLOAD).unwrap();
    let transport = MockTransport::failing();
    let gate = gate(&transport, Arc::clone(&store), PERIOD);

    let report = gate.flush().await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.retained, 1);
    assert!(gate.has_pending().unwrap());
    assert!(gate.is_timer_armed());

    let entries = store.checkout().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].destination, plain_destination());
    assert_eq!(entries[0].payload, PAYLOAD);
}

/// One failure then success drains by 2T.
#[tokio::test(start_paused = true)]
async fn transient_failure_drains_within_two_periods() {
    let transport = MockTransport::failing_times(1);
    let gate = gate(&transport, memory_store(), PERIOD);

    assert!(gate.submit(&plain_destination(), PAYLOAD).await.is_err());
    tokio::time::sleep(PERIOD * 2 + Duration::from_millis(10)).await;

    assert!(!gate.has_pending().unwrap());
    assert!(!gate.is_timer_armed());
}

/// A collector that never recovers sees one retry per period, no storm.
#[tokio::test(start_paused = true)]
async fn permanent_failure_retries_once_per_period() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    tokio::time::sleep(PERIOD * 3 + Duration::from_millis(10)).await;

    assert_eq!(transport.calls(), 1 + 3);
    assert!(gate.has_pending().unwrap());
    assert!(gate.is_timer_armed());
}

/// Some entries deliver, others stay for the next pass.
#[tokio::test(start_paused = true)]
async fn partial_flush_keeps_only_failures() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), b"keep").await;
    let _ = gate.submit(&plain_destination(), b"send").await;

    transport.set_failing(false);
    transport.fail_payload(b"keep");
    let report = gate.flush().await;

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.retained, 1);
    assert_eq!(gate.pending_count().unwrap(), 1);
    assert!(gate.is_timer_armed());
}

// ---------------------------------------------------------------------------
// Flush pass boundaries
// ---------------------------------------------------------------------------

/// An entry cached while a flush is resubmitting waits for the next pass.
#[tokio::test(start_paused = true)]
async fn entry_added_mid_flush_is_deferred() {
    let transport = MockTransport::failing();
    let gate = Arc::new(gate(&transport, memory_store(), Duration::from_secs(60)));

    let _ = gate.submit(&plain_destination(), b"first").await;
    transport.set_failing(false);
    transport.set_latency(Duration::from_secs(1));
    transport.fail_payload(b"second");

    let flushing = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.flush().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = gate.submit(&plain_destination(), b"second").await;
    assert!(result.unwrap_err().is_cached());

    let report = flushing.await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(gate.pending_count().unwrap(), 1);
    assert!(gate.is_timer_armed());
}

/// Overlapping flushes never resubmit the same entry twice.
#[tokio::test(start_paused = true)]
async fn overlapping_flushes_visit_each_entry_once() {
    let transport = MockTransport::failing();
    let gate = Arc::new(gate(&transport, memory_store(), Duration::from_secs(60)));

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    transport.set_failing(false);
    transport.set_latency(Duration::from_secs(1));

    let first = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.flush().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = gate.flush().await;
    let first = first.await.unwrap();

    assert_eq!(first.attempted + second.attempted, 1);
    assert_eq!(transport.delivered().len(), 1);
    assert!(!gate.has_pending().unwrap());
}

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// An unreachable network pauses recovery until `resume` is called.
#[tokio::test(start_paused = true)]
async fn unreachable_network_pauses_until_resumed() {
    let online = Arc::new(AtomicBool::new(false));
    let predicate = {
        let online = Arc::clone(&online);
        move || online.load(Ordering::SeqCst)
    };
    let transport = MockTransport::failing();
    let gate = DeliveryGate::new(
        GateConfig::default()
            .with_flush_interval(PERIOD)
            .with_reachability(predicate),
        transport.clone(),
        memory_store(),
    )
    .unwrap();

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    let report = gate.flush().await;
    assert_eq!(report.skipped, Some(FlushSkip::Unreachable));
    assert!(!gate.is_timer_armed());
    assert_eq!(transport.calls(), 1);

    tokio::time::sleep(PERIOD * 3).await;
    assert_eq!(transport.calls(), 1);
    assert!(gate.has_pending().unwrap());

    online.store(true, Ordering::SeqCst);
    transport.set_failing(false);
    assert!(gate.resume());
    assert!(!gate.resume());

    tokio::time::sleep(PERIOD + Duration::from_millis(10)).await;
    assert!(!gate.has_pending().unwrap());
}

/// Without an injected predicate the transport's own check is used.
#[tokio::test(start_paused = true)]
async fn transport_reachability_is_the_default() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    transport.set_reachable(false);

    tokio::time::sleep(PERIOD + Duration::from_millis(10)).await;
    assert_eq!(transport.calls(), 1);
    assert!(!gate.is_timer_armed());
    assert!(gate.has_pending().unwrap());
}

#[tokio::test(start_paused = true)]
async fn flush_of_empty_cache_is_skipped() {
    let transport = MockTransport::succeeding();
    let gate = gate(&transport, memory_store(), PERIOD);

    let report = gate.flush().await;
    assert_eq!(report.skipped, Some(FlushSkip::Empty));
    assert_eq!(transport.calls(), 0);
    assert!(!gate.resume());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Entries left from an earlier run arm the timer at construction.
#[tokio::test(start_paused = true)]
async fn persisted_entries_arm_timer_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");

    {
        let store = SqliteCacheStore::open(&path).unwrap();
        store.add(&plain_destination(), PAYLOAD).unwrap();
    }

    let store: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::open(&path).unwrap());
    let transport = MockTransport::succeeding();
    let gate = gate(&transport, store, PERIOD);
    assert!(gate.is_timer_armed());

    tokio::time::sleep(PERIOD + Duration::from_millis(10)).await;
    assert!(!gate.has_pending().unwrap());
    assert_eq!(transport.delivered(), vec![(plain_destination(), PAYLOAD.to_vec())]);
}

/// No fires after the gate is dropped.
#[tokio::test(start_paused = true)]
async fn dropping_gate_stops_timer() {
    let transport = MockTransport::failing();
    let store = memory_store();
    let gate = gate(&transport, Arc::clone(&store), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    drop(gate);

    tokio::time::sleep(PERIOD * 3).await;
    assert_eq!(transport.calls(), 1);
    assert!(store.has_pending().unwrap());
}

/// A resubmission still running after teardown completes without touching
/// the released store.
#[tokio::test(start_paused = true)]
async fn resubmission_outlives_gate_safely() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, memory_store(), PERIOD);

    let _ = gate.submit(&plain_destination(), PAYLOAD).await;
    transport.set_failing(false);
    transport.set_latency(Duration::from_secs(1));

    let flushing = tokio::spawn(async move { gate.flush().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    flushing.abort();
    assert!(flushing.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.delivered().len(), 1);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A store that cannot write makes the submission unrecoverable.
#[tokio::test(start_paused = true)]
async fn store_failure_is_unrecoverable() {
    let transport = MockTransport::failing();
    let gate = gate(&transport, Arc::new(BrokenStore), PERIOD);

    let result = gate.submit(&plain_destination(), PAYLOAD).await;
    assert!(matches!(result, Err(DeliveryError::Store(_))));
    assert_eq!(Outcome::of(&result), Outcome::Unrecoverable);
    assert!(!gate.is_timer_armed());
}

#[test]
fn gate_requires_runtime() {
    let result = DeliveryGate::new(
        GateConfig::default(),
        MockTransport::succeeding(),
        memory_store(),
    );
    assert!(matches!(result, Err(DeliveryError::NoRuntime)));
}

#[tokio::test(start_paused = true)]
async fn zero_flush_interval_is_rejected() {
    let transport = MockTransport::failing();
    let result = DeliveryGate::new(
        GateConfig::default().with_flush_interval(Duration::ZERO),
        transport.clone(),
        memory_store(),
    );
    assert!(matches!(result, Err(DeliveryError::ZeroFlushInterval)));

    // The smallest usable period still drains the cache once the collector is back.
    let gate = gate(&transport, memory_store(), Duration::from_millis(1));
    assert!(gate.submit(&plain_destination(), PAYLOAD).await.is_err());
    transport.set_failing(false);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gate.pending_count().unwrap(), 0);
    assert!(!gate.is_timer_armed());
}
