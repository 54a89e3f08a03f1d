//! rust-quiesce: two-phase shutdown for threaded services
//!
//! This crate provides:
//! - A [`ShutdownCoordinator`] that stops registered components cooperatively
//!   first and forcibly once a grace period expires
//! - A [`PulseLoop`] runner that repeats a short unit of work on its own thread
//!   and can be stopped gracefully or interrupted mid-pulse
//! - Injectable time ([`TimeSource`]) and sleep ([`SleepMethod`]) so shutdown
//!   timing can be tested without real delays
//!
//! ## Participants
//!
//! Anything the coordinator stops implements [`Stoppable`]; components that
//! can also be stopped preemptively implement [`ForceStoppable`]. The
//! capability is chosen at registration through [`Participant`].
//!
//! ## Examples
//!
//! ```rust,no_run
//! use rust_quiesce::{PulseContext, PulseError, PulseLoop, ShutdownCoordinator};
//! use std::time::Duration;
//!
//! let coordinator = ShutdownCoordinator::new();
//! coordinator.set_max_grace_seconds(5);
//!
//! let worker = PulseLoop::builder(|ctx: &PulseContext| -> Result<(), PulseError> {
//!     // do a little work, then wait for more
//!     ctx.sleep(Duration::from_millis(100))
//! })
//! .name("worker")
//! .build();
//! let handle = coordinator.spawn(worker).unwrap();
//!
//! // ... later, on the way out
//! for problem in coordinator.shutdown_gracefully() {
//!     eprintln!("shutdown problem: {problem}");
//! }
//! handle.join().unwrap().unwrap();
//! ```
//!
//! # Graceful Shutdown via Signals
//!
//! With the `signal` feature, [`signal::SignalHandler`] turns SIGINT, SIGTERM
//! and SIGHUP into [`signal::ShutdownRequest`]s: the first signal asks for a
//! graceful shutdown, a second one for an immediate shutdown.
//!
//! ```rust,ignore
//! use rust_quiesce::signal::SignalHandler;
//! use rust_quiesce::ShutdownCoordinator;
//!
//! let coordinator = ShutdownCoordinator::global();
//! let requests = SignalHandler::new().start()?;
//!
//! // block the main thread until someone asks us to stop
//! let request = requests.recv()?;
//! let problems = request.execute(coordinator);
//! std::process::exit(if problems.is_empty() { 0 } else { 1 });
//! ```

#![deny(warnings)]

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod logger;
pub mod participant;
pub mod pulse;
pub mod sleeper;

#[cfg(feature = "signal")]
pub mod signal;

// Re-export core types
pub use clock::{MonotonicClock, TimeSource};
pub use config::{ShutdownConfig, DEFAULT_GRACE_SECS, MINIMUM_GRACE_SECS, POLL_QUANTUM_MS};
pub use coordinator::ShutdownCoordinator;
pub use error::{PulseLoopError, ShutdownError};
pub use logger::{ErrorLogger, TracingLogger};
pub use participant::{BoxError, ForceStopFn, ForceStoppable, Participant, Stoppable};
pub use pulse::{
    NoHooks, PulseContext, PulseCounter, PulseError, PulseHooks, PulseLoop, PulseLoopBuilder,
    PulseWork,
};
pub use sleeper::{SleepError, SleepMethod, Sleeper, ThreadSleep};

/// Error types for shutdown coordination
pub mod error {
    use thiserror::Error;

    use crate::participant::BoxError;
    use crate::sleeper::SleepError;

    /// A failure collected during a shutdown; never aborts the shutdown itself
    #[derive(Error, Debug)]
    pub enum ShutdownError {
        #[error("graceful stop of {participant} failed: {source}")]
        GracefulStop {
            participant: String,
            #[source]
            source: BoxError,
        },

        #[error("forced stop of {participant} failed: {source}")]
        ForceStop {
            participant: String,
            #[source]
            source: BoxError,
        },

        #[error("waiting for participants failed: {0}")]
        Wait(#[from] SleepError),
    }

    impl ShutdownError {
        /// Name of the participant that failed, if the error came from one
        pub fn participant(&self) -> Option<&str> {
            match self {
                ShutdownError::GracefulStop { participant, .. }
                | ShutdownError::ForceStop { participant, .. } => Some(participant.as_str()),
                ShutdownError::Wait(_) => None,
            }
        }
    }

    #[derive(Error, Debug)]
    pub enum PulseLoopError {
        #[error("pulse loop {0} was already started")]
        AlreadyStarted(String),
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked
///
/// Every structure guarded this way stays consistent across a panic in a
/// participant callback, so poisoning carries no information here.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
