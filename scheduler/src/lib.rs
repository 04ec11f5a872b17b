//! Gating of camera frames in front of a recognizer.
//!
//! A [`RecognitionScheduler`] answers one question per incoming frame: may
//! this frame be submitted? It keeps at most one frame in flight, holds off
//! for a cooldown after every detection so a barcode that stays in view is not
//! reported over and over, and can optionally let only every Nth frame through.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scankit_scheduler::{ManualTimer, RecognitionScheduler, SchedulerConfig};
//!
//! let timer = ManualTimer::new();
//! let config = SchedulerConfig::default().cooldown(Duration::from_millis(500));
//! let scheduler = RecognitionScheduler::new(config, Arc::new(timer.clone()));
//!
//! assert!(scheduler.try_acquire());
//! assert!(!scheduler.try_acquire()); // one frame in flight
//! scheduler.on_success();
//! assert!(!scheduler.try_acquire()); // cooling down
//! timer.advance(Duration::from_millis(500));
//! assert!(scheduler.try_acquire());
//! ```

#![warn(missing_docs)]

mod throttle;
pub mod timer;

pub use throttle::FrameSkip;
pub use timer::{
    CancelSignal, ManualTimer, ThreadTimer, Timer, TimerAction, TimerError, TimerHandle,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, trace, warn};

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause after each detection.
    pub cooldown: Duration,
    /// Cooldowns at or below this are not worth a timer and are skipped.
    pub min_cooldown: Duration,
    /// Admit one frame in this many; `1` disables skipping.
    pub frame_skip: u32,
    /// Hold off for one cooldown before the first frame.
    pub cooldown_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::ZERO,
            min_cooldown: Duration::ZERO,
            frame_skip: 1,
            cooldown_on_start: false,
        }
    }
}

impl SchedulerConfig {
    /// Set the cooldown after a detection.
    #[must_use]
    pub const fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the shortest cooldown that still starts a timer.
    #[must_use]
    pub const fn min_cooldown(mut self, min_cooldown: Duration) -> Self {
        self.min_cooldown = min_cooldown;
        self
    }

    /// Admit one frame in `every`.
    #[must_use]
    pub const fn frame_skip(mut self, every: u32) -> Self {
        self.frame_skip = every;
        self
    }

    /// Start with a cooldown already running.
    #[must_use]
    pub const fn cooldown_on_start(mut self, enabled: bool) -> Self {
        self.cooldown_on_start = enabled;
        self
    }
}

#[derive(Debug)]
struct State {
    in_flight: bool,
    cooldown_active: bool,
    paused: bool,
    disposed: bool,
    cooldown: Duration,
    min_cooldown: Duration,
    skip: FrameSkip,
    /// Identifies the latest cooldown timer; older timers must not clear the flag.
    generation: u64,
    pending: Option<TimerHandle>,
}

/// Decides whether a frame may be submitted for recognition.
///
/// Cloning yields another handle to the same scheduler, so the frame path and
/// the recognition callback can each hold one.
#[derive(Debug, Clone)]
pub struct RecognitionScheduler {
    state: Arc<Mutex<State>>,
    timer: Arc<dyn Timer>,
}

impl RecognitionScheduler {
    /// Create a scheduler that runs cooldowns on `timer`.
    #[must_use]
    pub fn new(config: SchedulerConfig, timer: Arc<dyn Timer>) -> Self {
        let scheduler = Self {
            state: Arc::new(Mutex::new(State {
                in_flight: false,
                cooldown_active: false,
                paused: false,
                disposed: false,
                cooldown: config.cooldown,
                min_cooldown: config.min_cooldown,
                skip: FrameSkip::new(config.frame_skip),
                generation: 0,
                pending: None,
            })),
            timer,
        };
        if config.cooldown_on_start {
            let mut state = scheduler.lock();
            scheduler.start_cooldown(&mut state);
            drop(state);
        }
        scheduler
    }

    /// Create a scheduler backed by [`ThreadTimer`].
    #[must_use]
    pub fn with_thread_timer(config: SchedulerConfig) -> Self {
        Self::new(config, Arc::new(ThreadTimer))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the recognizer for the current frame.
    ///
    /// Returns `false` if the frame must be dropped: the scheduler is paused or
    /// disposed, the frame-skip throttle refuses it, a cooldown is running, or
    /// another frame is in flight. On `true` the caller must eventually call
    /// [`release`](Self::release) or [`on_success`](Self::on_success).
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.disposed || state.paused {
            return false;
        }
        if !state.skip.admit() {
            return false;
        }
        if state.cooldown_active || state.in_flight {
            state.skip.advance();
            return false;
        }
        state.in_flight = true;
        true
    }

    /// Finish the in-flight recognition without a detection.
    ///
    /// Returns `false` if the scheduler was already disposed and nothing changed.
    pub fn release(&self) -> bool {
        let mut state = self.lock();
        if state.disposed {
            debug!("release after dispose ignored");
            return false;
        }
        Self::finish(&mut state);
        true
    }

    /// Finish the in-flight recognition with a detection and start the cooldown.
    ///
    /// Returns `false` if the scheduler was already disposed; the detection
    /// should then be dropped.
    pub fn on_success(&self) -> bool {
        let mut state = self.lock();
        if state.disposed {
            debug!("success after dispose ignored");
            return false;
        }
        Self::finish(&mut state);
        state.skip.reset();
        self.start_cooldown(&mut state);
        true
    }

    fn finish(state: &mut State) {
        if state.in_flight {
            state.in_flight = false;
            state.skip.advance();
        }
    }

    /// Replace the cooldown duration.
    ///
    /// A cooldown that is already running restarts with the new duration.
    pub fn update_cooldown(&self, cooldown: Duration) {
        let mut state = self.lock();
        state.cooldown = cooldown;
        if state.cooldown_active && !state.disposed {
            self.start_cooldown(&mut state);
        }
    }

    /// Refuse every frame until [`resume`](Self::resume). In-flight and
    /// cooldown state keep evolving underneath.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Undo [`pause`](Self::pause).
    pub fn resume(&self) {
        self.lock().paused = false;
    }

    /// Cancel the pending cooldown timer and refuse all further work.
    pub fn dispose(&self) {
        let mut state = self.lock();
        state.disposed = true;
        state.cooldown_active = false;
        state.in_flight = false;
        if let Some(handle) = state.pending.take() {
            handle.cancel();
        }
    }

    /// Whether a frame is being recognized.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Whether a cooldown is running.
    #[must_use]
    pub fn is_cooling_down(&self) -> bool {
        self.lock().cooldown_active
    }

    /// Whether [`pause`](Self::pause) is in effect.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Current cooldown duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.lock().cooldown
    }

    fn start_cooldown(&self, state: &mut State) {
        if let Some(previous) = state.pending.take() {
            previous.cancel();
        }
        if state.cooldown <= state.min_cooldown {
            state.cooldown_active = false;
            return;
        }

        state.generation += 1;
        state.cooldown_active = true;
        let generation = state.generation;
        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        trace!("cooldown {generation} scheduled for {:?}", state.cooldown);

        let scheduled = self.timer.schedule_once(
            state.cooldown,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation == generation && !state.disposed {
                    state.cooldown_active = false;
                    state.pending = None;
                    trace!("cooldown {generation} elapsed");
                }
            }),
        );
        match scheduled {
            Ok(handle) => state.pending = Some(handle),
            Err(err) => {
                // Without a timer nothing would end the cooldown.
                warn!("cooldown skipped: {err}");
                state.cooldown_active = false;
            }
        }
    }
}
