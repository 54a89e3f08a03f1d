//! Time sources
//!
//! The coordinator never reads the wall clock directly. It asks a
//! [`TimeSource`] for monotonic milliseconds so tests can drive time by hand.

use std::time::Instant;

/// Supplies the current time in milliseconds
///
/// Successive readings must never go backwards. The epoch is arbitrary; only
/// differences between readings are meaningful.
pub trait TimeSource: Send + Sync {
    fn now_millis(&self) -> u64;
}

impl<F> TimeSource for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_millis(&self) -> u64 {
        self()
    }
}

/// Monotonic clock backed by [`Instant`], counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_millis(&self) -> u64 {
        // u64 millis covers ~584 million years of uptime
        self.origin.elapsed().as_millis() as u64
    }
}
