//! Load timeout scheduling.
//!
//! A timer never touches the session: when it expires it posts
//! [`PlaybackSignal::Timeout`] with the token it was armed for, and the
//! controller decides whether that token is still current.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, after, bounded, select};
use tracing::trace;

use crate::events::PlaybackSignal;
use crate::model::SessionToken;

/// Cancels the timer it was returned with. Dropping it does not cancel.
#[derive(Clone, Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake: None,
        }
    }

    /// A handle that also wakes a sleeper blocked on the returned receiver.
    fn with_waker() -> (Self, Receiver<()>) {
        let (tx, rx) = bounded(1);
        let handle = Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake: Some(tx),
        };
        (handle, rx)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(wake) = &self.wake {
            // full means a wake-up is already pending
            let _ = wake.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub trait TimerService {
    /// Arms a one-shot timer that posts `Timeout(token)` on `sink` after `delay`
    /// unless cancelled first.
    fn schedule(
        &mut self,
        delay: Duration,
        token: SessionToken,
        sink: Sender<PlaybackSignal>,
    ) -> TimerHandle;
}

/// Real-time timer: one sleeper thread per armed deadline.
///
/// A sleeper ends as soon as its handle is cancelled, so switching sources
/// quickly never piles up waiting threads. Clones share the count of live
/// sleepers.
#[derive(Clone, Debug, Default)]
pub struct ThreadTimer {
    sleepers: Arc<AtomicUsize>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeper threads still waiting for their deadline.
    pub fn sleeping(&self) -> usize {
        self.sleepers.load(Ordering::SeqCst)
    }
}

/// Decrements the sleeper count when the thread ends, however it ends.
struct SleeperGuard(Arc<AtomicUsize>);

impl Drop for SleeperGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TimerService for ThreadTimer {
    fn schedule(
        &mut self,
        delay: Duration,
        token: SessionToken,
        sink: Sender<PlaybackSignal>,
    ) -> TimerHandle {
        let (handle, wake) = TimerHandle::with_waker();
        let cancelled = Arc::clone(&handle.cancelled);
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        let guard = SleeperGuard(Arc::clone(&self.sleepers));

        thread::spawn(move || {
            let _guard = guard;
            let deadline = after(delay);
            select! {
                recv(wake) -> msg => {
                    if msg.is_ok() {
                        trace!(%token, "Load timer cancelled before expiry");
                        return;
                    }
                    // every handle dropped without cancelling: keep waiting
                    let _ = deadline.recv();
                }
                recv(deadline) -> _ => {}
            }
            if cancelled.load(Ordering::SeqCst) {
                trace!(%token, "Load timer cancelled before expiry");
                return;
            }
            // controller may be gone already
            let _ = sink.send(PlaybackSignal::Timeout(token));
        });
        handle
    }
}

#[derive(Debug)]
struct ArmedTimer {
    delay: Duration,
    token: SessionToken,
    sink: Sender<PlaybackSignal>,
    handle: TimerHandle,
}

/// Deterministic timer for tests and simulations: nothing expires until
/// [`ManualTimer::fire`] or [`ManualTimer::fire_all`] is called.
///
/// Clones share the same armed list, so a test can keep one clone while the
/// controller owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualTimer {
    armed: Arc<Mutex<Vec<ArmedTimer>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers armed and not cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Delays of every timer ever armed, in arming order.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.lock().iter().map(|t| t.delay).collect()
    }

    /// Expires the timer armed for `token`, even if it was cancelled.
    ///
    /// Firing a cancelled timer simulates an expiry racing its cancellation.
    /// Returns false when no timer was ever armed for `token`.
    pub fn fire(&self, token: SessionToken) -> bool {
        let armed = self.lock();
        match armed.iter().find(|t| t.token == token) {
            Some(timer) => {
                let _ = timer.sink.send(PlaybackSignal::Timeout(timer.token));
                true
            }
            None => false,
        }
    }

    /// Expires every timer that is still armed. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let armed = self.lock();
        let mut fired = 0;
        for timer in armed.iter().filter(|t| !t.handle.is_cancelled()) {
            let _ = timer.sink.send(PlaybackSignal::Timeout(timer.token));
            timer.handle.cancel();
            fired += 1;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ArmedTimer>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimerService for ManualTimer {
    fn schedule(
        &mut self,
        delay: Duration,
        token: SessionToken,
        sink: Sender<PlaybackSignal>,
    ) -> TimerHandle {
        let handle = TimerHandle::new();
        self.lock().push(ArmedTimer {
            delay,
            token,
            sink,
            handle: handle.clone(),
        });
        handle
    }
}
