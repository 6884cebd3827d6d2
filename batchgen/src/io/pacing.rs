//! Blocking waits: the call-rate limiter and backoff pauses.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Blocking wait. Tests substitute a recorder that returns immediately.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Single-slot limiter: at least `interval` between successive calls.
///
/// The first call is never delayed.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    /// Time still to wait if a call were made at `now`.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_call {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Block until the interval has passed, then mark the call slot as used.
    pub fn acquire<P: Pause + ?Sized>(&mut self, pause: &P) {
        let wait = self.remaining(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limiting");
            pause.pause(wait);
        }
        self.last_call = Some(Instant::now());
    }
}
