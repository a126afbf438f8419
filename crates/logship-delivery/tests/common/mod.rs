#![allow(dead_code)]

use async_trait::async_trait;
use logship_cache::{CacheStore, CachedEntry, EntryId, MemoryCacheStore, StoreError, StoreResult};
use logship_core::Destination;
use logship_delivery::{DeliveryGate, GateConfig, Transport, TransportError, TransportResponse};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Destination used by the reference scenarios.
pub fn plain_destination() -> Destination {
    Destination::http("192.168.0.1", 1111)
}

/// Payload used by the reference scenarios.
pub const PAYLOAD: &[u8] = br#"{"1":1,"2":2,"3":3}"#;

pub fn memory_store() -> Arc<dyn CacheStore> {
    Arc::new(MemoryCacheStore::new())
}

pub fn gate(transport: &Arc<MockTransport>, store: Arc<dyn CacheStore>, period: Duration) -> DeliveryGate {
    DeliveryGate::new(
        GateConfig::default().with_flush_interval(period),
        transport.clone(),
        store,
    )
    .expect("gate should build inside a runtime")
}

/// Scriptable transport recording every call.
pub struct MockTransport {
    always_fail: AtomicBool,
    failures_left: AtomicUsize,
    reachable: AtomicBool,
    latency: Mutex<Duration>,
    failing_payloads: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
    delivered: Mutex<Vec<(Destination, Vec<u8>)>>,
}

impl MockTransport {
    fn build(always_fail: bool, failures_left: usize) -> Arc<Self> {
        Arc::new(Self {
            always_fail: AtomicBool::new(always_fail),
            failures_left: AtomicUsize::new(failures_left),
            reachable: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            failing_payloads: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::build(false, 0)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, 0)
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn failing_times(n: usize) -> Arc<Self> {
        Self::build(false, n)
    }

    pub fn set_failing(&self, failing: bool) {
        self.always_fail.store(failing, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Always fail this exact payload.
    pub fn fail_payload(&self, payload: &[u8]) {
        self.failing_payloads.lock().unwrap().push(payload.to_vec());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<(Destination, Vec<u8>)> {
        self.delivered.lock().unwrap().clone()
    }

    fn should_fail(&self, payload: &[u8]) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        if self.failing_payloads.lock().unwrap().iter().any(|p| p == payload) {
            return true;
        }
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.should_fail(payload) {
            return Err(TransportError::Unreachable("mock collector offline".to_string()));
        }

        self.delivered
            .lock()
            .unwrap()
            .push((destination.clone(), payload.to_vec()));
        Ok(TransportResponse::http(202, Vec::new()))
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Store whose writes always fail.
pub struct BrokenStore;

impl CacheStore for BrokenStore {
    fn pending_count(&self) -> StoreResult<usize> {
        Ok(0)
    }

    fn add(&self, _destination: &Destination, _payload: &[u8]) -> StoreResult<EntryId> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn checkout(&self) -> StoreResult<Vec<CachedEntry>> {
        Ok(Vec::new())
    }

    fn complete(&self, _id: EntryId, _delivered: bool) -> StoreResult<()> {
        Ok(())
    }
}
