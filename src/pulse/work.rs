//! The unit of work a pulse loop repeats

use thiserror::Error;

use super::context::PulseContext;
use crate::participant::BoxError;

/// Outcome of a failed pulse
#[derive(Error, Debug)]
pub enum PulseError {
    /// The pulse was interrupted by a forced stop. Never logged.
    #[error("pulse cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(BoxError),
}

impl PulseError {
    /// Wraps any error as an ordinary pulse failure
    pub fn failed(error: impl Into<BoxError>) -> Self {
        PulseError::Failed(error.into())
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, PulseError::Cancelled)
    }
}

impl From<BoxError> for PulseError {
    fn from(error: BoxError) -> Self {
        PulseError::Failed(error)
    }
}

impl From<std::io::Error> for PulseError {
    fn from(error: std::io::Error) -> Self {
        PulseError::Failed(Box::new(error))
    }
}

/// A short, repeatable piece of work
///
/// Each call should return promptly. Work that blocks should do so through
/// the [`PulseContext`] so a forced stop can cut it short.
pub trait PulseWork: Send {
    fn pulse(&mut self, ctx: &PulseContext) -> Result<(), PulseError>;
}

impl<F> PulseWork for F
where
    F: FnMut(&PulseContext) -> Result<(), PulseError> + Send,
{
    fn pulse(&mut self, ctx: &PulseContext) -> Result<(), PulseError> {
        self(ctx)
    }
}
