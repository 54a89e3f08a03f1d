//! Cancellable pulse loops
//!
//! A [`PulseLoop`] owns one thread for as long as [`PulseLoop::run`] executes
//! and repeatedly invokes a short [`PulseWork`] ("a pulse") until a stop is
//! requested. It is itself a [`ForceStoppable`] participant:
//!
//! - `request_graceful_stop` sets a flag; the current pulse finishes first.
//! - `force_stop` also interrupts a pulse blocked in its [`PulseContext`].
//!
//! Ordinary pulse failures go to an [`ErrorLogger`] and the loop carries on.
//! A [`PulseError::Cancelled`] is the expected result of a forced stop and is
//! dropped silently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rust_quiesce::{PulseContext, PulseError, PulseLoop, Stoppable};
//! use std::time::Duration;
//!
//! let pulse_loop = PulseLoop::builder(|ctx: &PulseContext| -> Result<(), PulseError> {
//!     // poll a queue, flush a buffer, ...
//!     ctx.sleep(Duration::from_millis(50))
//! })
//! .name("flusher")
//! .build();
//!
//! let handle = pulse_loop.spawn().unwrap();
//! pulse_loop.request_graceful_stop().unwrap();
//! handle.join().unwrap().unwrap();
//! assert!(pulse_loop.is_stopped());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, Thread};

pub mod context;
pub mod hooks;
pub mod work;

pub use context::PulseContext;
pub use hooks::{NoHooks, PulseCounter, PulseHooks};
pub use work::{PulseError, PulseWork};

use context::Interrupt;

use crate::error::PulseLoopError;
use crate::lock;
use crate::logger::{ErrorLogger, TracingLogger};
use crate::participant::{BoxError, ForceStoppable, Participant, Stoppable};

/// Work plus hooks; taken out of the loop by the single `run` call
struct Body {
    work: Box<dyn PulseWork>,
    hooks: Box<dyn PulseHooks>,
}

impl Body {
    fn pulse(&mut self, ctx: &PulseContext) -> Result<(), PulseError> {
        self.hooks.before_pulse()?;
        self.work.pulse(ctx)?;
        self.hooks.after_pulse()
    }
}

/// A loop that repeatedly runs a short unit of work until stopped
pub struct PulseLoop {
    name: String,
    logger: Arc<dyn ErrorLogger>,
    body: Mutex<Option<Body>>,
    requested: AtomicBool,
    stopped: AtomicBool,
    /// Set by the running thread; only ever used to deliver an interrupt
    thread: Mutex<Option<Thread>>,
    interrupt: Interrupt,
}

impl PulseLoop {
    /// Creates a loop with default name, [`TracingLogger`], and no hooks
    pub fn new<W: PulseWork + 'static>(work: W) -> Arc<Self> {
        Self::builder(work).build()
    }

    pub fn builder<W: PulseWork + 'static>(work: W) -> PulseLoopBuilder {
        PulseLoopBuilder::new(Box::new(work))
    }

    /// Whether a stop (graceful or forced) has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Whether `run` is currently executing on some thread
    pub fn is_running(&self) -> bool {
        lock(&self.thread).is_some()
    }

    /// Runs the loop on the calling thread until a stop is requested
    ///
    /// Must be called at most once per instance; later calls return
    /// [`PulseLoopError::AlreadyStarted`] without touching the loop's state.
    pub fn run(&self) -> Result<(), PulseLoopError> {
        let mut body = lock(&self.body)
            .take()
            .ok_or_else(|| PulseLoopError::AlreadyStarted(self.name.clone()))?;

        *lock(&self.thread) = Some(thread::current());
        let ctx = self.interrupt.context();
        tracing::debug!("pulse loop {} started", self.name);

        let mut pulses: u64 = 0;
        while !self.requested.load(Ordering::SeqCst) {
            // A pending interrupt skips the pulse; the stop flag is rechecked
            if self.interrupt.take() {
                continue;
            }
            pulses += 1;
            if let Err(e) = body.pulse(&ctx) {
                self.handle(e);
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        *lock(&self.thread) = None;
        tracing::debug!("pulse loop {} stopped after {} pulses", self.name, pulses);
        Ok(())
    }

    /// Starts [`run`](Self::run) on a new thread named after the loop
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<JoinHandle<Result<(), PulseLoopError>>> {
        let this = Arc::clone(self);
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || this.run())
    }

    fn handle(&self, error: PulseError) {
        match error {
            PulseError::Cancelled => {
                tracing::trace!("pulse loop {} interrupted", self.name);
            }
            PulseError::Failed(e) => self.logger.log(&self.name, e),
        }
    }
}

impl Stoppable for PulseLoop {
    fn request_graceful_stop(&self) -> Result<(), BoxError> {
        self.requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ForceStoppable for PulseLoop {
    fn force_stop(&self) -> Result<(), BoxError> {
        self.requested.store(true, Ordering::SeqCst);
        // A stale read only means this stop stays cooperative
        let thread = lock(&self.thread).clone();
        if let Some(thread) = thread {
            if !self.is_stopped() {
                self.interrupt.raise();
                thread.unpark();
            }
        }
        Ok(())
    }
}

impl From<Arc<PulseLoop>> for Participant {
    fn from(pulse_loop: Arc<PulseLoop>) -> Self {
        Participant::Forceable(pulse_loop)
    }
}

impl std::fmt::Debug for PulseLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseLoop")
            .field("name", &self.name)
            .field("requested", &self.is_stop_requested())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Builder for customizing a [`PulseLoop`]
pub struct PulseLoopBuilder {
    name: Option<String>,
    logger: Arc<dyn ErrorLogger>,
    work: Box<dyn PulseWork>,
    hooks: Box<dyn PulseHooks>,
}

impl PulseLoopBuilder {
    fn new(work: Box<dyn PulseWork>) -> Self {
        Self {
            name: None,
            logger: Arc::new(TracingLogger),
            work,
            hooks: Box::new(NoHooks),
        }
    }

    /// Set the loop name, used for its thread and in logs
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Where ordinary pulse failures are sent
    pub fn logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn hooks<H: PulseHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn build(self) -> Arc<PulseLoop> {
        Arc::new(PulseLoop {
            name: self.name.unwrap_or_else(|| "pulse-loop".to_string()),
            logger: self.logger,
            body: Mutex::new(Some(Body {
                work: self.work,
                hooks: self.hooks,
            })),
            requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            thread: Mutex::new(None),
            interrupt: Interrupt::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(_: &PulseContext) -> Result<(), PulseError> {
        Ok(())
    }

    #[test]
    fn test_stop_before_run_exits_without_pulsing() {
        let counter = PulseCounter::new();
        let pulse_loop = PulseLoop::builder(idle).hooks(counter.clone()).build();
        assert!(!pulse_loop.is_stopped());

        pulse_loop.request_graceful_stop().unwrap();
        pulse_loop.run().unwrap();

        assert!(pulse_loop.is_stopped());
        assert!(!pulse_loop.is_running());
        assert_eq!(counter.started(), 0);
    }

    #[test]
    fn test_second_run_is_rejected() {
        let pulse_loop = PulseLoop::builder(idle).name("once").build();
        pulse_loop.request_graceful_stop().unwrap();
        pulse_loop.run().unwrap();

        let err = pulse_loop.run().unwrap_err();
        assert!(matches!(err, PulseLoopError::AlreadyStarted(ref name) if name == "once"));
        assert!(pulse_loop.is_stopped());
    }

    #[test]
    fn test_force_stop_on_idle_loop_only_sets_flag() {
        let pulse_loop = PulseLoop::new(idle);
        pulse_loop.force_stop().unwrap();
        assert!(pulse_loop.is_stop_requested());
        assert!(!pulse_loop.is_stopped());
        // no thread was captured, so no interrupt is pending
        assert!(!pulse_loop.interrupt.take());
    }

    #[test]
    fn test_hook_failure_skips_work() {
        struct FailingBefore;
        impl PulseHooks for FailingBefore {
            fn before_pulse(&mut self) -> Result<(), PulseError> {
                Err(PulseError::failed("not ready"))
            }
        }

        let logged = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let logged = logged.clone();
            move |_: &str, e: BoxError| logged.lock().unwrap().push(e.to_string())
        };

        let worked = Arc::new(AtomicBool::new(false));
        let pulse_loop = {
            let worked = worked.clone();
            PulseLoop::builder(move |_: &PulseContext| -> Result<(), PulseError> {
                worked.store(true, Ordering::SeqCst);
                Ok(())
            })
            .logger(Arc::new(sink))
            .hooks(FailingBefore)
            .build()
        };

        let handle = pulse_loop.spawn().unwrap();
        while logged.lock().unwrap().is_empty() {
            thread::yield_now();
        }
        pulse_loop.request_graceful_stop().unwrap();
        handle.join().unwrap().unwrap();

        assert!(!worked.load(Ordering::SeqCst));
        assert!(logged.lock().unwrap().iter().all(|m| m == "not ready"));
    }
}
