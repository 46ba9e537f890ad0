//! Client-side request budget over a rolling window.
//!
//! Cooperative, single-threaded pacing: once the request count reaches the
//! limit inside the current window, the caller sleeps out the window
//! remainder and the counter resets. No token bucket, no burst credit.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateWindow {
    limit: u32,
    window: Duration,
    window_start: Option<Instant>,
    issued: u32,
}

impl RateWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            window_start: None,
            issued: 0,
        }
    }

    /// Account for one request about to be issued at `now`.
    ///
    /// Returns the pause the caller must take before issuing it, if the
    /// window budget is already spent. Taking `now` as a parameter keeps
    /// the pacing logic deterministic under test.
    pub fn before_request(&mut self, now: Instant) -> Option<Duration> {
        let start = match self.window_start {
            None => {
                self.window_start = Some(now);
                self.issued = 1;
                return None;
            }
            Some(start) => start,
        };

        let elapsed = now.duration_since(start);

        if elapsed >= self.window {
            // Window expired on its own; start a fresh one
            self.window_start = Some(now);
            self.issued = 1;
            return None;
        }

        if self.issued < self.limit {
            self.issued += 1;
            return None;
        }

        // Budget spent: sleep out the remainder, then this request opens
        // the next window.
        let pause = self.window - elapsed;
        self.window_start = Some(now + pause);
        self.issued = 1;
        Some(pause)
    }
}
