//! The delivery gate.
//!
//! [`DeliveryGate`] forwards every payload to its transport. A failed
//! submission is written to the cache store and the recovery timer is
//! armed. Each timer fire flushes the cache: pending entries are resubmitted
//! concurrently, removed when delivered, and kept when they fail again. The
//! timer disarms once a flush finds the cache empty or the network
//! unreachable.

use crate::{
    DeliveryError, DeliveryResult, Reachability, RecoveryTimer, TimerLock, Transport,
    TransportResponse,
};
use logship_cache::{for_each_pending, CacheStore, EntryId};
use logship_core::{Destination, ShipperConfig, DEFAULT_FLUSH_INTERVAL_SECS};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Gate configuration.
#[derive(Clone)]
pub struct GateConfig {
    /// Period of the recovery timer.
    pub flush_interval: Duration,
    /// Overrides the transport's own reachability check.
    pub reachability: Option<Arc<dyn Reachability>>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            reachability: None,
        }
    }
}

impl GateConfig {
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_reachability(mut self, reachability: impl Reachability + 'static) -> Self {
        self.reachability = Some(Arc::new(reachability));
        self
    }
}

impl From<&ShipperConfig> for GateConfig {
    fn from(config: &ShipperConfig) -> Self {
        Self::default().with_flush_interval(config.flush_interval())
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("flush_interval", &self.flush_interval)
            .field("reachability", &self.reachability.is_some())
            .finish()
    }
}

/// Why a flush did not resubmit anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSkip {
    /// The cache held no entries.
    Empty,
    /// The network was reported unreachable.
    Unreachable,
    /// The cache store could not be read.
    StoreUnavailable,
}

/// Result of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries checked out and resubmitted.
    pub attempted: usize,
    pub delivered: usize,
    /// Entries whose resubmission failed and that stay cached.
    pub retained: usize,
    pub skipped: Option<FlushSkip>,
}

impl FlushReport {
    fn skipped(reason: FlushSkip) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// Forwards payloads to a transport and caches the ones that fail.
///
/// Must be created inside a Tokio runtime. Dropping the gate cancels the
/// recovery timer; resubmissions already started run to completion.
pub struct DeliveryGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
    reachability: Option<Arc<dyn Reachability>>,
    flush_interval: Duration,
    timer: RecoveryTimer,
    runtime: Handle,
}

impl DeliveryGate {
    /// Create a gate. Arms the recovery timer right away when the store
    /// already holds entries from an earlier run.
    ///
    /// A zero `flush_interval` is rejected with
    /// [`DeliveryError::ZeroFlushInterval`].
    pub fn new(
        config: GateConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheStore>,
    ) -> DeliveryResult<Self> {
        if config.flush_interval.is_zero() {
            return Err(DeliveryError::ZeroFlushInterval);
        }
        let runtime = Handle::try_current().map_err(|_| DeliveryError::NoRuntime)?;

        let inner = Arc::new(GateInner {
            transport,
            store,
            reachability: config.reachability,
            flush_interval: config.flush_interval,
            timer: RecoveryTimer::new(),
            runtime,
        });

        let mut timer = inner.timer.lock();
        let pending = inner.store.pending_count()?;
        if pending > 0 {
            info!(pending, "Cache holds undelivered entries, arming recovery timer");
            inner.arm(&mut timer);
        }
        drop(timer);

        Ok(Self { inner })
    }

    /// Submit a payload.
    ///
    /// Returns the transport response on success. When the transport fails
    /// the payload is cached and [`DeliveryError::CachedAfterError`] is
    /// returned. [`DeliveryError::Store`] means the payload could not be
    /// cached either.
    pub async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> DeliveryResult<TransportResponse> {
        self.inner.submit(destination, payload).await
    }

    /// Submit on a background task so the caller never waits on I/O.
    pub fn submit_detached(
        &self,
        destination: Destination,
        payload: Vec<u8>,
    ) -> JoinHandle<DeliveryResult<TransportResponse>> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn(async move { inner.submit(&destination, &payload).await })
    }

    /// Resubmit every pending entry now and wait for the outcomes.
    pub async fn flush(&self) -> FlushReport {
        self.inner.flush().await
    }

    /// Re-arm the recovery timer if the cache holds entries. Returns whether
    /// a new timer was started.
    ///
    /// Call this when the network is known to be back.
    pub fn resume(&self) -> bool {
        let mut timer = self.inner.timer.lock();
        match self.inner.store.has_pending() {
            Ok(true) => self.inner.arm(&mut timer),
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "Cannot read cache store, not resuming");
                false
            }
        }
    }

    pub fn pending_count(&self) -> DeliveryResult<usize> {
        Ok(self.inner.store.pending_count()?)
    }

    pub fn has_pending(&self) -> DeliveryResult<bool> {
        Ok(self.inner.store.has_pending()?)
    }

    pub fn is_timer_armed(&self) -> bool {
        self.inner.timer.is_armed()
    }

    pub fn flush_interval(&self) -> Duration {
        self.inner.flush_interval
    }

    /// The transport behind the gate, for sends that must bypass the cache.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }
}

impl Drop for DeliveryGate {
    fn drop(&mut self) {
        if self.inner.timer.disarm() {
            debug!("Delivery gate dropped, recovery timer cancelled");
        }
    }
}

impl GateInner {
    async fn submit(
        self: &Arc<Self>,
        destination: &Destination,
        payload: &[u8],
    ) -> DeliveryResult<TransportResponse> {
        match self.transport.submit(destination, payload).await {
            Ok(response) => {
                debug!(destination = %destination, bytes = payload.len(), "Delivered");
                Ok(response)
            }
            Err(source) => {
                let id = self.cache(destination, payload)?;
                warn!(
                    destination = %destination,
                    entry_id = %id,
                    error = %source,
                    "Delivery failed, payload cached for retry"
                );
                Err(DeliveryError::CachedAfterError { source })
            }
        }
    }

    /// Add to the store and arm the timer inside one critical section.
    fn cache(self: &Arc<Self>, destination: &Destination, payload: &[u8]) -> DeliveryResult<EntryId> {
        let mut timer = self.timer.lock();
        let id = self.store.add(destination, payload).map_err(|e| {
            error!(destination = %destination, error = %e, "Failed to cache undelivered payload");
            DeliveryError::Store(e)
        })?;
        self.arm(&mut timer);
        Ok(id)
    }

    /// The timer task holds a weak reference and stops once the gate is gone.
    fn arm(self: &Arc<Self>, timer: &mut TimerLock<'_>) -> bool {
        let weak = Arc::downgrade(self);
        timer.arm(&self.runtime, self.flush_interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        let report = inner.flush().await;
                        debug!(?report, "Timed flush finished");
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
        })
    }

    fn is_reachable(&self) -> bool {
        match &self.reachability {
            Some(reachability) => reachability.is_reachable(),
            None => self.transport.is_reachable(),
        }
    }

    async fn flush(self: &Arc<Self>) -> FlushReport {
        match self.store.has_pending() {
            Ok(true) if self.is_reachable() => {}
            Ok(true) => {
                debug!("Network unreachable, pausing recovery");
                if self.timer.disarm() {
                    debug!("Recovery timer disarmed");
                }
                return FlushReport::skipped(FlushSkip::Unreachable);
            }
            Ok(false) => {
                self.settle_timer();
                return FlushReport::skipped(FlushSkip::Empty);
            }
            Err(e) => {
                error!(error = %e, "Cannot read cache store, stopping recovery");
                self.timer.disarm();
                return FlushReport::skipped(FlushSkip::StoreUnavailable);
            }
        }

        let mut resubmissions = Vec::new();
        let visited = for_each_pending(&self.store, |entry, completion| {
            let transport = Arc::clone(&self.transport);
            resubmissions.push(self.runtime.spawn(async move {
                let delivered = match transport.submit(&entry.destination, &entry.payload).await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(entry_id = %entry.id, error = %e, "Resubmission failed");
                        false
                    }
                };
                if let Err(e) = completion.report(delivered) {
                    error!(entry_id = %entry.id, error = %e, "Failed to record resubmission outcome");
                }
                delivered
            }));
        });

        let attempted = match visited {
            Ok(attempted) => attempted,
            Err(e) => {
                error!(error = %e, "Cannot check out cached entries, stopping recovery");
                self.timer.disarm();
                return FlushReport::skipped(FlushSkip::StoreUnavailable);
            }
        };

        let mut report = FlushReport {
            attempted,
            ..FlushReport::default()
        };
        for resubmission in resubmissions {
            match resubmission.await {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.retained += 1,
                Err(e) => {
                    warn!(error = %e, "Resubmission task failed");
                    report.retained += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                delivered = report.delivered,
                retained = report.retained,
                "Flushed cached entries"
            );
        }
        self.settle_timer();
        report
    }

    /// Keep the timer armed exactly while entries remain.
    fn settle_timer(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        match self.store.has_pending() {
            Ok(true) => {
                self.arm(&mut timer);
            }
            Ok(false) => {
                if timer.disarm() {
                    debug!("Cache drained, recovery timer disarmed");
                }
            }
            Err(e) => {
                error!(error = %e, "Cannot read cache store, stopping recovery");
                timer.disarm();
            }
        }
    }
}
