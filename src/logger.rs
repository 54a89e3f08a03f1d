//! Error sinks for pulse failures
//!
//! A [`PulseLoop`](crate::PulseLoop) never propagates work errors; it hands
//! them to an [`ErrorLogger`] and keeps pulsing.

use crate::participant::BoxError;

/// Receives ordinary (non-cancellation) pulse failures
pub trait ErrorLogger: Send + Sync {
    fn log(&self, source: &str, error: BoxError);
}

impl<F> ErrorLogger for F
where
    F: Fn(&str, BoxError) + Send + Sync,
{
    fn log(&self, source: &str, error: BoxError) {
        self(source, error)
    }
}

/// Writes each failure as a `tracing` error event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn log(&self, source: &str, error: BoxError) {
        tracing::error!(loop_name = source, "pulse failed: {}", error);
    }
}
