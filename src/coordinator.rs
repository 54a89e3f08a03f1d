//! Two-phase shutdown coordination
//!
//! The [`ShutdownCoordinator`] keeps an ordered registry of participants and
//! stops them in two phases:
//!
//! 1. **Graceful.** Every force-capable participant is asked to stop, then
//!    every graceful-only one, each group newest-first. Force-capable
//!    participants go first so they get the most time before the deadline.
//!    The registry is then polled, dropping participants as they report
//!    stopped, until it is empty or the grace period runs out.
//! 2. **Forced.** If the deadline passes, every force-capable participant
//!    still registered is force-stopped (newest-first), followed by the
//!    optional last-resort handler.
//!
//! Errors from individual participants never interrupt the sequence; they
//! are collected and returned so the caller can decide what to report.
//!
//! Newest-first ordering lets components registered later (workers) stop
//! before the earlier components (pools, connections) they depend on.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use once_cell::sync::Lazy;

use crate::config::ShutdownConfig;
use crate::error::{PulseLoopError, ShutdownError};
use crate::lock;
use crate::participant::{ForceStoppable, Participant, Stoppable};
use crate::pulse::PulseLoop;
use crate::sleeper::Sleeper;

#[derive(Default)]
struct Registry {
    forceables: Vec<Arc<dyn ForceStoppable>>,
    gracefuls: Vec<Arc<dyn Stoppable>>,
}

impl Registry {
    /// Removes the given participants; returns whether any remain
    fn remove(
        &mut self,
        forceables: &[Arc<dyn ForceStoppable>],
        gracefuls: &[Arc<dyn Stoppable>],
    ) -> bool {
        self.forceables
            .retain(|p| !forceables.iter().any(|gone| Arc::ptr_eq(p, gone)));
        self.gracefuls
            .retain(|p| !gracefuls.iter().any(|gone| Arc::ptr_eq(p, gone)));
        !self.forceables.is_empty() || !self.gracefuls.is_empty()
    }
}

static GLOBAL: Lazy<ShutdownCoordinator> = Lazy::new(ShutdownCoordinator::new);

/// Coordinates the shutdown of registered participants
pub struct ShutdownCoordinator {
    registry: Mutex<Registry>,
    last_resort: Mutex<Option<Arc<dyn ForceStoppable>>>,
    config: Mutex<ShutdownConfig>,
    sleeper: Sleeper,
}

impl ShutdownCoordinator {
    /// A coordinator on the system clock with default settings
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            last_resort: Mutex::new(None),
            config: Mutex::new(ShutdownConfig::default()),
            sleeper: Sleeper::system(),
        }
    }

    /// The process-wide coordinator
    pub fn global() -> &'static ShutdownCoordinator {
        &GLOBAL
    }

    /// Sets the handler force-stopped after everything else when the grace
    /// period expires (and at the end of [`shutdown_now`](Self::shutdown_now))
    pub fn with_last_resort(self, last_resort: Arc<dyn ForceStoppable>) -> Self {
        self.set_last_resort(last_resort);
        self
    }

    /// Installs or replaces the last-resort handler, e.g. on the
    /// [`global`](Self::global) coordinator
    pub fn set_last_resort(&self, last_resort: Arc<dyn ForceStoppable>) {
        tracing::debug!("last resort set to {}", last_resort.name());
        *lock(&self.last_resort) = Some(last_resort);
    }

    /// Replaces the clock and sleep used while waiting for participants
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_config(self, config: ShutdownConfig) -> Self {
        *lock(&self.config) = config;
        self
    }

    /// Sets the grace period; values below the floor are ignored
    ///
    /// Returns whether the value was accepted.
    pub fn set_max_grace_seconds(&self, seconds: u32) -> bool {
        let accepted = lock(&self.config).set_grace_seconds(seconds);
        if !accepted {
            tracing::debug!("ignoring grace period of {}s (below minimum)", seconds);
        }
        accepted
    }

    pub fn grace_seconds(&self) -> u32 {
        lock(&self.config).grace_seconds()
    }

    /// Appends a participant to the list matching its capability
    ///
    /// Safe to call while a shutdown is in progress; the participant is only
    /// seen by passes that start after it was added.
    pub fn register(&self, participant: impl Into<Participant>) -> &Self {
        let participant = participant.into();
        tracing::debug!("registering {:?}", participant);
        let mut registry = lock(&self.registry);
        match participant {
            Participant::Graceful(s) => registry.gracefuls.push(s),
            Participant::Forceable(s) => registry.forceables.push(s),
        }
        self
    }

    pub fn register_all<I, P>(&self, participants: I) -> &Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Participant>,
    {
        for participant in participants {
            self.register(participant);
        }
        self
    }

    /// Starts `pulse_loop` on its own thread and registers it
    ///
    /// The loop is only registered once its thread has been created.
    pub fn spawn(
        &self,
        pulse_loop: Arc<PulseLoop>,
    ) -> std::io::Result<JoinHandle<Result<(), PulseLoopError>>> {
        let handle = pulse_loop.spawn()?;
        self.register(pulse_loop);
        Ok(handle)
    }

    pub fn has_forceable(&self) -> bool {
        !lock(&self.registry).forceables.is_empty()
    }

    pub fn has_graceful(&self) -> bool {
        !lock(&self.registry).gracefuls.is_empty()
    }

    /// Number of registered participants not yet seen stopped
    pub fn pending(&self) -> usize {
        let registry = lock(&self.registry);
        registry.forceables.len() + registry.gracefuls.len()
    }

    /// Empties the registry and restores the default settings
    pub fn clear(&self) {
        *lock(&self.registry) = Registry::default();
        *lock(&self.config) = ShutdownConfig::default();
    }

    /// Runs the two-phase shutdown, blocking for at most the grace period
    ///
    /// Returns every error raised by a participant; empty when all stopped
    /// cleanly in time. An expired grace period is not itself an error.
    pub fn shutdown_gracefully(&self) -> Vec<ShutdownError> {
        let config = *lock(&self.config);
        let started = self.sleeper.now_millis();
        let deadline = started.saturating_add(config.grace_millis());
        let mut problems = Vec::new();

        let (forceables, gracefuls) = self.snapshot();
        tracing::info!(
            "graceful shutdown of {} participants ({} force-capable), grace {}s",
            forceables.len() + gracefuls.len(),
            forceables.len(),
            config.grace_seconds()
        );

        // force-capable first so they get a bit more time
        for participant in forceables.iter().rev() {
            request_graceful(participant.as_ref(), &mut problems);
        }
        for participant in gracefuls.iter().rev() {
            request_graceful(participant.as_ref(), &mut problems);
        }

        while self.purge_stopped() {
            let now = self.sleeper.now_millis();
            let remaining = deadline.saturating_sub(now);
            if remaining == 0 {
                tracing::warn!(
                    "grace period of {}s expired with {} participants running, forcing",
                    config.grace_seconds(),
                    self.pending()
                );
                self.force_all(&mut problems);
                return problems;
            }
            tracing::trace!("{}ms of grace remaining", remaining);
            // never sleep past the deadline
            let pause = remaining.min(config.poll_quantum_ms());
            if let Err(e) = self.sleeper.for_millis(pause) {
                tracing::warn!("waiting for participants failed, forcing: {}", e);
                problems.push(ShutdownError::Wait(e));
                self.force_all(&mut problems);
                return problems;
            }
        }

        tracing::info!("all participants stopped ({} errors)", problems.len());
        problems
    }

    /// Skips the graceful phase and force-stops everything immediately
    ///
    /// Never polls participants and never reads the clock.
    pub fn shutdown_now(&self) -> Vec<ShutdownError> {
        tracing::info!("immediate shutdown requested");
        let mut problems = Vec::new();
        self.force_all(&mut problems);
        problems
    }

    /// Drops every participant that reports stopped; returns whether any remain
    ///
    /// `is_stopped` runs on a snapshot with no lock held, so participants may
    /// call back into the coordinator. Each list is checked newest-first.
    fn purge_stopped(&self) -> bool {
        let (forceables, gracefuls) = self.snapshot();
        let stopped_forceables: Vec<_> = forceables
            .iter()
            .rev()
            .filter(|p| p.is_stopped())
            .cloned()
            .collect();
        let stopped_gracefuls: Vec<_> = gracefuls
            .iter()
            .rev()
            .filter(|p| p.is_stopped())
            .cloned()
            .collect();
        for gone in &stopped_forceables {
            tracing::debug!("{} stopped", gone.name());
        }
        for gone in &stopped_gracefuls {
            tracing::debug!("{} stopped", gone.name());
        }
        lock(&self.registry).remove(&stopped_forceables, &stopped_gracefuls)
    }

    fn snapshot(&self) -> (Vec<Arc<dyn ForceStoppable>>, Vec<Arc<dyn Stoppable>>) {
        let registry = lock(&self.registry);
        (registry.forceables.clone(), registry.gracefuls.clone())
    }

    fn force_all(&self, problems: &mut Vec<ShutdownError>) {
        let forceables = lock(&self.registry).forceables.clone();
        for participant in forceables.iter().rev() {
            force(participant.as_ref(), problems);
        }
        let last_resort = lock(&self.last_resort).clone();
        if let Some(last_resort) = last_resort {
            force(last_resort.as_ref(), problems);
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = lock(&self.registry);
        f.debug_struct("ShutdownCoordinator")
            .field("forceables", &registry.forceables.len())
            .field("gracefuls", &registry.gracefuls.len())
            .field(
                "last_resort",
                &lock(&self.last_resort).as_ref().map(|s| s.name().to_string()),
            )
            .field("config", &*lock(&self.config))
            .finish()
    }
}

fn request_graceful<S: Stoppable + ?Sized>(participant: &S, problems: &mut Vec<ShutdownError>) {
    tracing::debug!("requesting graceful stop of {}", participant.name());
    if let Err(source) = participant.request_graceful_stop() {
        problems.push(ShutdownError::GracefulStop {
            participant: participant.name().to_string(),
            source,
        });
    }
}

fn force<S: ForceStoppable + ?Sized>(participant: &S, problems: &mut Vec<ShutdownError>) {
    tracing::debug!("forcing stop of {}", participant.name());
    if let Err(source) = participant.force_stop() {
        problems.push(ShutdownError::ForceStop {
            participant: participant.name().to_string(),
            source,
        });
    }
}
