//! One-shot timers with cancellation.
//!
//! Cancellation follows the close-the-channel pattern: a [`TimerHandle`] owns
//! the sending half of a channel and closes it on [`cancel`](TimerHandle::cancel)
//! or drop, and the timer checks the receiving half before firing.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use futures::future::{self, Either};

/// Deferred work run by a [`Timer`].
pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur while scheduling.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The background thread could not be started.
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] io::Error),
    /// The timer can no longer schedule work.
    #[error("timer is unavailable: {0}")]
    Unavailable(String),
}

/// Schedules one-shot actions.
///
/// Implementations must not run `action` before `schedule_once` returns.
pub trait Timer: Send + Sync + fmt::Debug {
    /// Run `action` once after `delay`, unless the returned handle is cancelled
    /// or dropped first.
    ///
    /// # Errors
    /// Returns a [`TimerError`] if the action could not be scheduled; it will
    /// never run in that case.
    fn schedule_once(&self, delay: Duration, action: TimerAction)
    -> Result<TimerHandle, TimerError>;
}

/// Cancels a scheduled action when cancelled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    sender: Sender<()>,
}

impl TimerHandle {
    /// Create a handle and the signal a timer checks before firing.
    #[must_use]
    pub fn new() -> (Self, CancelSignal) {
        let (sender, receiver) = async_channel::bounded(1);
        (Self { sender }, CancelSignal { receiver })
    }

    /// Cancel the scheduled action.
    pub fn cancel(&self) {
        self.sender.close();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.sender.close();
    }
}

/// Timer-side view of a [`TimerHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Receiver<()>,
}

impl CancelSignal {
    /// Check if the handle was cancelled or dropped (non-blocking).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.receiver.is_closed()
    }

    /// Wait until the handle is cancelled or dropped.
    pub async fn cancelled(&self) {
        // Nothing is ever sent; recv only returns once the channel closes.
        let _ = self.receiver.recv().await;
    }
}

/// Runs each action on a short-lived background thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimer;

impl Timer for ThreadTimer {
    fn schedule_once(
        &self,
        delay: Duration,
        action: TimerAction,
    ) -> Result<TimerHandle, TimerError> {
        let (handle, signal) = TimerHandle::new();
        thread::Builder::new()
            .name("scankit-timer".into())
            .spawn(move || {
                let elapsed = futures::executor::block_on(async {
                    let delay = futures_timer::Delay::new(delay);
                    let cancelled = signal.cancelled();
                    futures::pin_mut!(cancelled);
                    matches!(future::select(delay, cancelled).await, Either::Left(_))
                });
                if elapsed && !signal.is_cancelled() {
                    action();
                }
            })?;
        Ok(handle)
    }
}

struct Pending {
    due: Duration,
    signal: CancelSignal,
    action: TimerAction,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    pending: Vec<Pending>,
}

/// Timer driven by an explicit clock.
///
/// Nothing fires until [`advance`](Self::advance) moves the clock past an
/// action's deadline. Hosts that already own a frame clock can drive cooldowns
/// from it, and tests get deterministic time.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualState>>,
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ManualTimer")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl ManualTimer {
    /// Create a timer at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).now
    }

    /// Number of scheduled actions that are neither fired nor cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .iter()
            .filter(|p| !p.signal.is_cancelled())
            .count()
    }

    /// Move the clock forward and run every action that became due, in
    /// deadline order.
    pub fn advance(&self, by: Duration) {
        let due = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.now += by;
            let now = state.now;
            let (due, rest): (Vec<_>, Vec<_>) = state
                .pending
                .drain(..)
                .filter(|p| !p.signal.is_cancelled())
                .partition(|p| p.due <= now);
            state.pending = rest;
            due
        };

        let mut due = due;
        due.sort_by_key(|p| p.due);
        for pending in due {
            if !pending.signal.is_cancelled() {
                (pending.action)();
            }
        }
    }
}

impl Timer for ManualTimer {
    fn schedule_once(
        &self,
        delay: Duration,
        action: TimerAction,
    ) -> Result<TimerHandle, TimerError> {
        let (handle, signal) = TimerHandle::new();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let due = state.now + delay;
        state.pending.push(Pending {
            due,
            signal,
            action,
        });
        Ok(handle)
    }
}
