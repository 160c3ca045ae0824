//! Rate limiting for the live metrics stream.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Passes at most one emission per interval. The first call after
/// construction or reset always passes.
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Returns `true` when the caller may emit now. Suppressed calls do
    /// not extend the window.
    pub fn try_acquire(&self) -> bool {
        let mut last = self.last.lock();
        match *last {
            Some(at) if at.elapsed() < self.interval => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
