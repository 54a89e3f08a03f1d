//! Signal handling module
//!
//! This module bridges OS termination signals to the shutdown coordinator
//! using the signal-hook crate. It spawns a dedicated thread that listens for
//! SIGINT, SIGTERM, and SIGHUP:
//! - The first signal sends [`ShutdownRequest::Graceful`]
//! - Any later signal sends [`ShutdownRequest::Now`]
//! - User-defined signal callbacks run for every signal
//!
//! The listener never runs the shutdown itself; the receiving thread does,
//! so a slow graceful shutdown can still be escalated by a second signal.

use crossbeam_channel::{unbounded, Receiver, Sender};
use signal_hook::{consts::signal::*, iterator::Signals};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::coordinator::ShutdownCoordinator;
use crate::error::ShutdownError;

/// Signals treated as a request to terminate
pub const SHUTDOWN_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// What a received signal asks the process to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    Graceful,
    Now,
}

impl ShutdownRequest {
    /// Runs the matching protocol on `coordinator`
    pub fn execute(self, coordinator: &ShutdownCoordinator) -> Vec<ShutdownError> {
        match self {
            ShutdownRequest::Graceful => coordinator.shutdown_gracefully(),
            ShutdownRequest::Now => coordinator.shutdown_now(),
        }
    }
}

/// Type for user-defined signal callbacks
pub type SignalCallback = Box<dyn Fn(i32) + Send + Sync>;

/// Turns termination signals into [`ShutdownRequest`]s
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    callbacks: HashMap<i32, Vec<SignalCallback>>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            callbacks: HashMap::new(),
        }
    }

    /// Shares an existing flag, set when the first signal arrives
    pub fn with_flag(shutdown_flag: Arc<AtomicBool>) -> Self {
        Self {
            shutdown_flag,
            callbacks: HashMap::new(),
        }
    }

    /// Flag set once any shutdown signal has been received
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown_flag.clone()
    }

    /// Register a callback for a specific signal
    pub fn register_callback<F>(&mut self, signal: i32, callback: F)
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.callbacks
            .entry(signal)
            .or_default()
            .push(Box::new(callback));
    }

    /// Installs the handlers and starts listening in a dedicated thread
    ///
    /// Returns the channel on which shutdown requests arrive.
    pub fn start(self) -> std::io::Result<Receiver<ShutdownRequest>> {
        let signals = Signals::new(SHUTDOWN_SIGNALS)?;
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("shutdown-signals".to_string())
            .spawn(move || self.listen(signals, tx))?;
        Ok(rx)
    }

    fn listen(self, mut signals: Signals, requests: Sender<ShutdownRequest>) {
        for signal in signals.forever() {
            if let Some(callbacks) = self.callbacks.get(&signal) {
                for callback in callbacks {
                    callback(signal);
                }
            }

            let request = if self.shutdown_flag.swap(true, Ordering::SeqCst) {
                tracing::warn!("Received second signal {}, forcing shutdown", signal);
                ShutdownRequest::Now
            } else {
                tracing::info!("Received signal {} for graceful shutdown", signal);
                ShutdownRequest::Graceful
            };

            if requests.send(request).is_err() {
                tracing::debug!("shutdown request receiver dropped, signal listener exiting");
                return;
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
