//! Capability contracts for components the coordinator can stop
//!
//! A component is either [`Stoppable`] (graceful stop only) or
//! [`ForceStoppable`] (graceful plus forced stop). The capability is chosen
//! explicitly when building a [`Participant`], so the coordinator never has to
//! inspect types at runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error type returned by participants, pulse work, and hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A component that can be asked to stop cooperatively
///
/// After a successful `request_graceful_stop`, `is_stopped` must eventually
/// return `true`. `is_stopped` may be polled many times and must not have
/// side effects beyond internal bookkeeping.
pub trait Stoppable: Send + Sync {
    /// Asks the component to wind down; completion is observed via `is_stopped`
    fn request_graceful_stop(&self) -> Result<(), BoxError>;

    /// Whether the component has fully stopped
    fn is_stopped(&self) -> bool;

    /// Name used in logs and error reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A [`Stoppable`] that can also be stopped preemptively
pub trait ForceStoppable: Stoppable {
    /// Best-effort immediate stop; may interrupt blocked work
    fn force_stop(&self) -> Result<(), BoxError>;
}

/// A registration entry, tagged with the participant's capability
#[derive(Clone)]
pub enum Participant {
    Graceful(Arc<dyn Stoppable>),
    Forceable(Arc<dyn ForceStoppable>),
}

impl Participant {
    /// Registers a component for graceful stop only
    pub fn graceful<S: Stoppable + 'static>(stoppable: Arc<S>) -> Self {
        Participant::Graceful(stoppable)
    }

    /// Registers a component that also supports forced stop
    pub fn forceable<S: ForceStoppable + 'static>(stoppable: Arc<S>) -> Self {
        Participant::Forceable(stoppable)
    }

    pub fn name(&self) -> &str {
        match self {
            Participant::Graceful(s) => s.name(),
            Participant::Forceable(s) => s.name(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        match self {
            Participant::Graceful(s) => s.is_stopped(),
            Participant::Forceable(s) => s.is_stopped(),
        }
    }

    pub fn is_forceable(&self) -> bool {
        matches!(self, Participant::Forceable(_))
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Participant::Graceful(s) => f.debug_tuple("Graceful").field(&s.name()).finish(),
            Participant::Forceable(s) => f.debug_tuple("Forceable").field(&s.name()).finish(),
        }
    }
}

/// Wraps a closure as a [`ForceStoppable`], typically as the last-resort handler
///
/// Both stop requests invoke the closure; after it succeeds once the adaptor
/// reports stopped.
pub struct ForceStopFn<F> {
    name: String,
    stop: F,
    stopped: AtomicBool,
}

impl<F> ForceStopFn<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, stop: F) -> Self {
        Self {
            name: name.into(),
            stop,
            stopped: AtomicBool::new(false),
        }
    }

    fn invoke(&self) -> Result<(), BoxError> {
        (self.stop)()?;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl<F> Stoppable for ForceStopFn<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync,
{
    fn request_graceful_stop(&self) -> Result<(), BoxError> {
        self.invoke()
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> ForceStoppable for ForceStopFn<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync,
{
    fn force_stop(&self) -> Result<(), BoxError> {
        self.invoke()
    }
}
