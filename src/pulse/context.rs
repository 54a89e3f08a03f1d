//! Interrupt delivery into a running pulse
//!
//! A forced stop raises an interrupt on a one-slot channel. Work blocked in
//! [`PulseContext::sleep`] or one of the `recv` helpers wakes immediately
//! with [`PulseError::Cancelled`], consuming the interrupt.

use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::work::PulseError;

/// One pending-interrupt slot shared by a loop and its context
#[derive(Debug, Clone)]
pub(crate) struct Interrupt {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Interrupt {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Marks an interrupt pending; a second raise before it is taken is a no-op
    pub(crate) fn raise(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("interrupt raised after context dropped");
            }
        }
    }

    /// Consumes a pending interrupt, returning whether one was set
    pub(crate) fn take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    pub(crate) fn context(&self) -> PulseContext {
        PulseContext {
            interrupts: self.rx.clone(),
        }
    }
}

/// Handle given to [`PulseWork`](super::PulseWork) for cancellable blocking
#[derive(Debug, Clone)]
pub struct PulseContext {
    interrupts: Receiver<()>,
}

impl PulseContext {
    /// Returns `Err(Cancelled)` if an interrupt is pending, consuming it
    pub fn check_cancelled(&self) -> Result<(), PulseError> {
        match self.interrupts.try_recv() {
            Ok(()) => Err(PulseError::Cancelled),
            Err(_) => Ok(()),
        }
    }

    /// Sleeps for `duration` unless interrupted first
    pub fn sleep(&self, duration: Duration) -> Result<(), PulseError> {
        match self.interrupts.recv_timeout(duration) {
            Ok(()) => Err(PulseError::Cancelled),
            Err(RecvTimeoutError::Timeout) => Ok(()),
            // The loop owns the sender, so this only happens once it is gone
            Err(RecvTimeoutError::Disconnected) => Err(PulseError::Cancelled),
        }
    }

    /// Blocks on `rx` until a value arrives or the pulse is interrupted
    ///
    /// A disconnected `rx` is reported as an ordinary failure.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Result<T, PulseError> {
        select! {
            recv(rx) -> msg => msg.map_err(PulseError::failed),
            recv(self.interrupts) -> _ => Err(PulseError::Cancelled),
        }
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`, returning `Ok(None)`
    pub fn recv_timeout<T>(&self, rx: &Receiver<T>, timeout: Duration) -> Result<Option<T>, PulseError> {
        select! {
            recv(rx) -> msg => msg.map(Some).map_err(PulseError::failed),
            recv(self.interrupts) -> _ => Err(PulseError::Cancelled),
            default(timeout) => Ok(None),
        }
    }
}
