// clock.rs

use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Monotonic time source measured in seconds.
///
/// The scheduler stamps every step with a time from this clock, and the
/// MIDI output thread uses the same clock to decide when a message is due.
pub trait AudioClock: Send + Sync + 'static {
    fn now(&self) -> f64;

    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&self) {}
}

struct MonotonicState {
    /// Seconds accumulated before the current running span
    elapsed: f64,
    running_since: Option<Instant>,
}

/// Wall clock that only advances while running.
///
/// Starts suspended at 0.0. Clones share the same timeline.
#[derive(Clone)]
pub struct MonotonicClock {
    state: Arc<Mutex<MonotonicState>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MonotonicState {
                elapsed: 0.0,
                running_since: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonotonicState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn suspend(&self) {
        let mut state = self.lock();
        if let Some(since) = state.running_since.take() {
            state.elapsed += since.elapsed().as_secs_f64();
            debug!("Clock suspended at {:.3}s", state.elapsed);
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for MonotonicClock {
    fn now(&self) -> f64 {
        let state = self.lock();
        match state.running_since {
            Some(since) => state.elapsed + since.elapsed().as_secs_f64(),
            None => state.elapsed,
        }
    }

    fn is_suspended(&self) -> bool {
        self.lock().running_since.is_none()
    }

    fn resume(&self) {
        let mut state = self.lock();
        if state.running_since.is_none() {
            info!("Clock resumed at {:.3}s", state.elapsed);
            state.running_since = Some(Instant::now());
        }
    }
}

/// Clock that only moves when told to. Used to drive the scheduler
/// deterministically in tests and offline rendering.
#[derive(Clone, Default)]
pub struct ManualClock {
    seconds: Arc<Mutex<f64>>,
    suspended: Arc<Mutex<bool>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts in the suspended state so `resume` can be observed
    pub fn suspended() -> Self {
        let clock = Self::default();
        *clock.suspended.lock().unwrap_or_else(PoisonError::into_inner) = true;
        clock
    }

    pub fn set(&self, seconds: f64) {
        *self.seconds.lock().unwrap_or_else(PoisonError::into_inner) = seconds;
    }

    pub fn advance(&self, seconds: f64) {
        *self.seconds.lock().unwrap_or_else(PoisonError::into_inner) += seconds;
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        *self.seconds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_suspended(&self) -> bool {
        *self.suspended.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resume(&self) {
        *self.suspended.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}
