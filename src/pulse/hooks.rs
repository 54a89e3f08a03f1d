//! Per-pulse bookkeeping hooks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::work::PulseError;

/// Runs around every pulse
///
/// An error from `before_pulse` skips the work for that iteration; an error
/// from either hook is handled like a work error.
pub trait PulseHooks: Send {
    fn before_pulse(&mut self) -> Result<(), PulseError> {
        Ok(())
    }

    fn after_pulse(&mut self) -> Result<(), PulseError> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl PulseHooks for NoHooks {}

/// Counts started and completed pulses
///
/// Clones share the same counters, so one copy can be handed to the loop and
/// another kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct PulseCounter {
    started: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Pulses whose work returned without error
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl PulseHooks for PulseCounter {
    fn before_pulse(&mut self) -> Result<(), PulseError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn after_pulse(&mut self) -> Result<(), PulseError> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
