//! Lookahead step scheduler
//!
//! A coarse, jittery wake timer drives the scheduler, but every step is
//! handed to the [`StepHandler`] with the exact clock time at which it
//! should sound. Each wake commits all steps falling inside the lookahead
//! window and then arms exactly one further wake.

use crate::clock::AudioClock;
use crate::pattern::StepPattern;
use crate::state::{PatternSlot, PlaybackCursor};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_SCHEDULE_AHEAD_SECS: f64 = 0.1;
pub const DEFAULT_WAKE_INTERVAL: Duration = Duration::from_millis(25);
/// Tempos above this are clamped
pub const MAX_TEMPO_BPM: f64 = 1000.0;

/// Receives each step together with the clock time it is due at
pub trait StepHandler: Send + 'static {
    fn on_step(&mut self, step: usize, time: f64);
}

impl<F> StepHandler for F
where
    F: FnMut(usize, f64) + Send + 'static,
{
    fn on_step(&mut self, step: usize, time: f64) {
        self(step, time)
    }
}

/// A one-shot callback run by a [`WakeTimer`]
pub type Wake = Box<dyn FnOnce() + Send + 'static>;

/// Cancels its wake when dropped
pub struct WakeHandle {
    cancelled: Arc<AtomicBool>,
}

impl WakeHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: cancelled.clone(),
            },
            cancelled,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for WakeHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One-shot delayed callbacks
pub trait WakeTimer: Send + Sync + 'static {
    fn schedule(&self, delay: Duration, wake: Wake) -> WakeHandle;
}

struct TimerJob {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
    wake: Wake,
}

/// Runs wakes on a single background thread.
///
/// The thread exits once the timer is dropped; wakes still pending at that
/// point never fire.
pub struct ThreadTimer {
    jobs: Sender<TimerJob>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        let (jobs, rx) = channel::unbounded();
        thread::spawn(move || run_timer(rx));
        Self { jobs }
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeTimer for ThreadTimer {
    fn schedule(&self, delay: Duration, wake: Wake) -> WakeHandle {
        let (handle, cancelled) = WakeHandle::new();
        let job = TimerJob {
            deadline: Instant::now() + delay,
            cancelled,
            wake,
        };
        if self.jobs.send(job).is_err() {
            warn!("Timer thread has exited, wake dropped");
        }
        handle
    }
}

fn run_timer(jobs: Receiver<TimerJob>) {
    debug!("Timer thread started");
    let mut pending: Vec<TimerJob> = Vec::new();

    loop {
        pending.retain(|job| !job.cancelled.load(Ordering::SeqCst));

        let received = match pending.iter().map(|job| job.deadline).min() {
            Some(deadline) => jobs.recv_deadline(deadline),
            None => jobs.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(job) => pending.push(job),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) =
            pending.drain(..).partition(|job| job.deadline <= now);
        pending = later;

        for job in due {
            if !job.cancelled.load(Ordering::SeqCst) {
                (job.wake)();
            }
        }
    }
    debug!("Timer thread stopped");
}

struct ManualWake {
    delay: Duration,
    cancelled: Arc<AtomicBool>,
    wake: Wake,
}

/// Timer whose wakes only run when [`ManualTimer::fire`] is called
#[derive(Clone, Default)]
pub struct ManualTimer {
    queue: Arc<Mutex<Vec<ManualWake>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, Vec<ManualWake>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of scheduled wakes that have not been cancelled
    pub fn pending(&self) -> usize {
        self.queue()
            .iter()
            .filter(|w| !w.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Delays of the live pending wakes, in scheduling order
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.queue()
            .iter()
            .filter(|w| !w.cancelled.load(Ordering::SeqCst))
            .map(|w| w.delay)
            .collect()
    }

    /// Runs every pending wake regardless of its delay, returning how many
    /// ran. Wakes scheduled while firing wait for the next call.
    pub fn fire(&self) -> usize {
        let due: Vec<ManualWake> = self.queue().drain(..).collect();
        let mut fired = 0;
        for wake in due {
            if !wake.cancelled.load(Ordering::SeqCst) {
                (wake.wake)();
                fired += 1;
            }
        }
        fired
    }
}

impl WakeTimer for ManualTimer {
    fn schedule(&self, delay: Duration, wake: Wake) -> WakeHandle {
        let (handle, cancelled) = WakeHandle::new();
        self.queue().push(ManualWake {
            delay,
            cancelled,
            wake,
        });
        handle
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// How far past the current clock time steps are committed
    pub schedule_ahead_secs: f64,
    pub wake_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_ahead_secs: DEFAULT_SCHEDULE_AHEAD_SECS,
            wake_interval: DEFAULT_WAKE_INTERVAL,
        }
    }
}

struct Inner<H> {
    handler: H,
    cursor: PlaybackCursor,
    playing: bool,
    /// Bumped on every start and stop so older wakes recognise themselves
    session: u64,
    pending: Option<WakeHandle>,
}

struct Shared<C, H> {
    clock: C,
    timer: Arc<dyn WakeTimer>,
    pattern: PatternSlot,
    config: SchedulerConfig,
    inner: Mutex<Inner<H>>,
}

impl<C: AudioClock, H: StepHandler> Shared<C, H> {
    fn lock(&self) -> MutexGuard<'_, Inner<H>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits every step due before `now + schedule_ahead`
    fn pump(&self, inner: &mut Inner<H>) {
        let horizon = self.clock.now() + self.config.schedule_ahead_secs;
        while inner.cursor.next_trigger_time < horizon {
            let length = self.pattern.length();
            if inner.cursor.current_step >= length {
                inner.cursor.current_step %= length.max(1);
            }
            trace!(
                "Step {} at {:.4}s",
                inner.cursor.current_step,
                inner.cursor.next_trigger_time
            );
            let due = inner.cursor.next_trigger_time;
            inner.handler.on_step(inner.cursor.current_step, due);
            inner.cursor.advance(length);
            if inner.cursor.next_trigger_time <= due {
                warn!("Step time stuck at {:.4}s, deferring to next wake", due);
                break;
            }
        }
    }

    fn arm(self: &Arc<Self>, inner: &mut Inner<H>) {
        let weak = Arc::downgrade(self);
        let session = inner.session;
        let handle = self
            .timer
            .schedule(self.config.wake_interval, Box::new(move || wake(&weak, session)));
        // Replacing an older handle cancels it
        inner.pending = Some(handle);
    }
}

fn wake<C: AudioClock, H: StepHandler>(weak: &Weak<Shared<C, H>>, session: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut inner = shared.lock();
    if !inner.playing || inner.session != session {
        trace!("Ignoring stale wake from session {}", session);
        return;
    }
    inner.pending = None;
    shared.pump(&mut inner);
    shared.arm(&mut inner);
}

/// Drives a [`StepHandler`] from a pattern and an [`AudioClock`].
///
/// The handler is called while the scheduler's lock is held, so it must not
/// call back into the scheduler.
pub struct Scheduler<C: AudioClock, H: StepHandler> {
    shared: Arc<Shared<C, H>>,
}

impl<C: AudioClock, H: StepHandler> Scheduler<C, H> {
    pub fn new(
        clock: C,
        timer: Arc<dyn WakeTimer>,
        pattern: PatternSlot,
        handler: H,
        config: SchedulerConfig,
    ) -> Self {
        let tempo = f64::from(pattern.tempo()).min(MAX_TEMPO_BPM);
        Self {
            shared: Arc::new(Shared {
                clock,
                timer,
                pattern,
                config,
                inner: Mutex::new(Inner {
                    handler,
                    cursor: PlaybackCursor::new(tempo),
                    playing: false,
                    session: 0,
                    pending: None,
                }),
            }),
        }
    }

    pub fn start(&self) {
        let mut inner = self.shared.lock();
        if inner.playing {
            debug!("Start requested while already playing, ignoring");
            return;
        }

        let clock = &self.shared.clock;
        if clock.is_suspended() {
            clock.resume();
        }
        inner.cursor.reset(clock.now());
        inner.playing = true;
        inner.session += 1;
        info!(
            "Playback started at {:.3}s, {} BPM",
            inner.cursor.next_trigger_time, inner.cursor.tempo_bpm
        );

        self.shared.pump(&mut inner);
        self.shared.arm(&mut inner);
    }

    /// Stops playback. No step fires after this returns.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        if inner.playing {
            info!("Playback stopped at step {}", inner.cursor.current_step);
        }
        inner.playing = false;
        inner.session += 1;
        inner.pending = None;
        inner.cursor.current_step = 0;
    }

    /// Takes effect from the next step advance; steps already handed out
    /// keep their times. Values above [`MAX_TEMPO_BPM`] are clamped.
    pub fn set_tempo(&self, bpm: f64) {
        if !bpm.is_finite() || bpm <= 0.0 {
            warn!("Ignoring invalid tempo {}", bpm);
            return;
        }
        let bpm = if bpm > MAX_TEMPO_BPM {
            warn!("Tempo {} BPM clamped to {}", bpm, MAX_TEMPO_BPM);
            MAX_TEMPO_BPM
        } else {
            bpm
        };
        info!("Tempo set to {} BPM", bpm);
        self.shared.lock().cursor.tempo_bpm = bpm;
    }

    pub fn tempo(&self) -> f64 {
        self.shared.lock().cursor.tempo_bpm
    }

    /// Installs a new pattern and rewinds to the first step
    pub fn load_pattern(&self, pattern: StepPattern) {
        let mut inner = self.shared.lock();
        self.shared.pattern.replace(pattern);
        inner.cursor.current_step = 0;
    }

    /// The live pattern; edits published through it apply from the next
    /// step boundary
    pub fn pattern(&self) -> &PatternSlot {
        &self.shared.pattern
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.shared.lock().cursor
    }
}

impl<C: AudioClock, H: StepHandler> Drop for Scheduler<C, H> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    type Log = Arc<Mutex<Vec<(usize, f64)>>>;

    fn recorder() -> (Log, impl FnMut(usize, f64) + Send + 'static) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |step, time| sink.lock().unwrap().push((step, time)))
    }

    #[test]
    fn test_wake_handle_cancels_on_drop() {
        let (handle, flag) = WakeHandle::new();
        assert!(!flag.load(Ordering::SeqCst));
        drop(handle);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_manual_timer_skips_cancelled_wakes() {
        let timer = ManualTimer::new();
        let hits = Arc::new(Mutex::new(0));

        let counter = hits.clone();
        let kept = timer.schedule(Duration::from_millis(5), Box::new(move || *counter.lock().unwrap() += 1));
        let counter = hits.clone();
        let dropped = timer.schedule(Duration::from_millis(5), Box::new(move || *counter.lock().unwrap() += 1));
        drop(dropped);

        assert_eq!(timer.pending(), 1);
        assert_eq!(timer.fire(), 1);
        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(!kept.is_cancelled());
    }

    #[test]
    fn test_thread_timer_fires_after_delay() {
        let timer = ThreadTimer::new();
        let (tx, rx) = channel::bounded(1);
        let started = Instant::now();
        let _handle = timer.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(Instant::now());
            }),
        );
        let fired_at = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired_at.duration_since(started) >= Duration::from_millis(20));
    }

    #[test]
    fn test_thread_timer_cancel() {
        let timer = ThreadTimer::new();
        let (tx, rx) = channel::bounded(1);
        let handle = timer.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        handle.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_start_fills_lookahead_window() {
        let clock = ManualClock::new();
        let timer = ManualTimer::new();
        let (log, handler) = recorder();
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            PatternSlot::default(),
            handler,
            SchedulerConfig::default(),
        );

        scheduler.start();

        // 120 BPM: 0.125s per step, so only step 0 fits in 0.1s
        assert_eq!(*log.lock().unwrap(), vec![(0, 0.0)]);
        assert_eq!(timer.pending_delays(), vec![DEFAULT_WAKE_INTERVAL]);
    }

    #[test]
    fn test_stop_resets_and_disarms() {
        let clock = ManualClock::new();
        let timer = ManualTimer::new();
        let (log, handler) = recorder();
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            PatternSlot::default(),
            handler,
            SchedulerConfig::default(),
        );

        scheduler.start();
        clock.advance(0.1);
        timer.fire();
        assert_eq!(scheduler.cursor().current_step, 2);

        scheduler.stop();
        assert!(!scheduler.is_playing());
        assert_eq!(scheduler.cursor().current_step, 0);
        assert_eq!(timer.pending(), 0);

        clock.advance(1.0);
        assert_eq!(timer.fire(), 0);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_tempo_is_ignored() {
        let (_log, handler) = recorder();
        let scheduler = Scheduler::new(
            ManualClock::new(),
            Arc::new(ManualTimer::new()),
            PatternSlot::default(),
            handler,
            SchedulerConfig::default(),
        );
        scheduler.set_tempo(0.0);
        scheduler.set_tempo(-10.0);
        scheduler.set_tempo(f64::NAN);
        assert_eq!(scheduler.tempo(), 120.0);
        scheduler.set_tempo(90.0);
        assert_eq!(scheduler.tempo(), 90.0);
    }

    #[test]
    fn test_huge_tempo_is_clamped_and_start_returns() {
        let clock = ManualClock::new();
        clock.set(1.0);
        let timer = ManualTimer::new();
        let (log, handler) = recorder();
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            PatternSlot::default(),
            handler,
            SchedulerConfig::default(),
        );
        scheduler.set_tempo(1e18);
        assert_eq!(scheduler.tempo(), MAX_TEMPO_BPM);

        let (tx, rx) = channel::bounded(1);
        let worker = thread::spawn(move || {
            scheduler.start();
            let _ = tx.send(());
            scheduler
        });
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        let scheduler = worker.join().unwrap();

        // 0.015s per step: steps at 1.000 through 1.090 fall inside 0.1s
        assert_eq!(log.lock().unwrap().len(), 7);
        scheduler.stop();
    }
}
