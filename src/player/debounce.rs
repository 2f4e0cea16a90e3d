//! Trailing-edge debouncing for rapid setter calls (seek, volume).

use std::time::{Duration, Instant};

/// Holds the latest value until it has been quiet for `interval`.
#[derive(Debug)]
pub struct Debouncer<T> {
    interval: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
        }
    }

    /// Replace any pending value and restart the quiet period.
    pub fn push(&mut self, value: T) {
        self.push_at(value, Instant::now());
    }

    pub fn push_at(&mut self, value: T, at: Instant) {
        self.pending = Some((value, at));
    }

    /// The pending value, if its quiet period has elapsed by `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.duration_since(*at) >= self.interval => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// The pending value regardless of timing.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
