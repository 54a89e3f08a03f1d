//! Configuration constants for the shutdown coordinator
//!
//! This module contains tunable parameters that affect how long a graceful
//! shutdown may take and how aggressively completion is polled.

/// Grace period used when none is configured (in seconds)
///
/// This is how long `shutdown_gracefully` waits for participants to report
/// stopped before escalating to a forced stop.
pub const DEFAULT_GRACE_SECS: u32 = 10;

/// Smallest grace period accepted (in seconds)
///
/// Requests for a shorter grace period are ignored and the previous value is
/// retained.
pub const MINIMUM_GRACE_SECS: u32 = 2;

/// Poll interval while waiting for participants to stop (in milliseconds)
///
/// A smaller value notices completion sooner but wakes the caller's thread
/// more often. The coordinator never sleeps past the grace deadline.
pub const POLL_QUANTUM_MS: u64 = 2;

/// Settings for a [`ShutdownCoordinator`](crate::ShutdownCoordinator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    grace_seconds: u32,
    poll_quantum_ms: u64,
}

impl ShutdownConfig {
    /// Returns the configured grace period in seconds
    pub fn grace_seconds(&self) -> u32 {
        self.grace_seconds
    }

    /// Returns the poll interval in milliseconds
    pub fn poll_quantum_ms(&self) -> u64 {
        self.poll_quantum_ms
    }

    /// Grace period in milliseconds, as added to the clock at shutdown start
    pub fn grace_millis(&self) -> u64 {
        u64::from(self.grace_seconds) * 1000
    }

    /// Sets the grace period if it is at least [`MINIMUM_GRACE_SECS`]
    ///
    /// Returns `false` (and leaves the config unchanged) otherwise.
    pub fn set_grace_seconds(&mut self, seconds: u32) -> bool {
        if seconds < MINIMUM_GRACE_SECS {
            return false;
        }
        self.grace_seconds = seconds;
        true
    }

    /// Builder form of [`set_grace_seconds`](Self::set_grace_seconds)
    pub fn with_grace_seconds(mut self, seconds: u32) -> Self {
        self.set_grace_seconds(seconds);
        self
    }

    /// Overrides the poll interval; zero is bumped to one millisecond
    pub fn with_poll_quantum_ms(mut self, millis: u64) -> Self {
        self.poll_quantum_ms = millis.max(1);
        self
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_seconds: DEFAULT_GRACE_SECS,
            poll_quantum_ms: POLL_QUANTUM_MS,
        }
    }
}
