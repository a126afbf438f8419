//! Repeating recovery timer.
//!
//! At most one timer task exists per [`RecoveryTimer`]. Arming while armed
//! is a no-op. The first fire comes one period after arming, and each fire
//! runs to completion before the next tick is awaited, so fires never
//! overlap and a slow fire delays the schedule instead of bursting.
//!
//! Arm and disarm decisions are taken through a [`TimerLock`], which callers
//! hold across the state check that motivates the decision.

use parking_lot::{Mutex, MutexGuard};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Default)]
struct TimerSlot {
    /// Bumped on every arm and disarm. A task only acts while its
    /// generation is current.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct RecoveryTimer {
    slot: Arc<Mutex<TimerSlot>>,
}

/// Exclusive access to the timer state.
pub struct TimerLock<'a> {
    shared: &'a Arc<Mutex<TimerSlot>>,
    slot: MutexGuard<'a, TimerSlot>,
}

impl RecoveryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> TimerLock<'_> {
        TimerLock {
            shared: &self.slot,
            slot: self.slot.lock(),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock().is_armed()
    }

    /// Cancel the timer. Returns whether one was armed.
    pub fn disarm(&self) -> bool {
        self.lock().disarm()
    }
}

impl Drop for RecoveryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl TimerLock<'_> {
    pub fn is_armed(&self) -> bool {
        self.slot
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start firing `tick` every `period` unless already armed.
    ///
    /// The timer stops when `tick` returns `ControlFlow::Break`, or when it
    /// is disarmed. Returns whether a new timer was started; a zero
    /// `period` never starts one.
    pub fn arm<F, Fut>(&mut self, runtime: &Handle, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_armed() {
            return false;
        }
        if period.is_zero() {
            warn!("Refusing to arm recovery timer with a zero period");
            return false;
        }

        self.slot.generation += 1;
        let generation = self.slot.generation;
        let shared = Arc::clone(self.shared);

        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if shared.lock().generation != generation {
                    return;
                }
                if tick().await.is_break() {
                    break;
                }
            }

            let mut slot = shared.lock();
            if slot.generation == generation {
                slot.generation += 1;
                slot.task = None;
                debug!(generation, "Recovery timer stopped");
            }
        });

        self.slot.task = Some(task);
        debug!(generation, period_ms = period.as_millis() as u64, "Recovery timer armed");
        true
    }

    /// Cancel the timer. Returns whether one was armed.
    pub fn disarm(&mut self) -> bool {
        let Some(task) = self.slot.task.take() else {
            return false;
        };
        self.slot.generation += 1;
        task.abort();
        debug!(generation = self.slot.generation, "Recovery timer disarmed");
        true
    }
}
