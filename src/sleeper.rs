//! Bounded waits against an injectable clock
//!
//! [`Sleeper`] pairs a [`TimeSource`] with a [`SleepMethod`]. It keeps sleeping
//! until the clock says the requested span has elapsed, so an early wake-up
//! (an interrupt, a spurious return) never shortens the wait.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::{MonotonicClock, TimeSource};
use crate::participant::BoxError;

/// Failure reported by a [`SleepMethod`]
#[derive(Error, Debug)]
pub enum SleepError {
    /// The sleep was cut short; the caller may simply sleep again
    #[error("sleep interrupted")]
    Interrupted,

    #[error("sleep failed: {0}")]
    Failed(#[source] BoxError),
}

/// Blocks the calling thread for roughly the given number of milliseconds
pub trait SleepMethod: Send + Sync {
    fn sleep_millis(&self, millis: u64) -> Result<(), SleepError>;
}

impl<F> SleepMethod for F
where
    F: Fn(u64) -> Result<(), SleepError> + Send + Sync,
{
    fn sleep_millis(&self, millis: u64) -> Result<(), SleepError> {
        self(millis)
    }
}

/// [`SleepMethod`] using [`std::thread::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl SleepMethod for ThreadSleep {
    fn sleep_millis(&self, millis: u64) -> Result<(), SleepError> {
        std::thread::sleep(Duration::from_millis(millis));
        Ok(())
    }
}

/// The waiter: sleeps for a span measured by its own clock
#[derive(Clone)]
pub struct Sleeper {
    time_source: Arc<dyn TimeSource>,
    sleep_method: Arc<dyn SleepMethod>,
}

impl Sleeper {
    pub fn new(time_source: Arc<dyn TimeSource>, sleep_method: Arc<dyn SleepMethod>) -> Self {
        Self {
            time_source,
            sleep_method,
        }
    }

    /// Real-time sleeper over a [`MonotonicClock`] and [`ThreadSleep`]
    pub fn system() -> Self {
        Self::new(Arc::new(MonotonicClock::new()), Arc::new(ThreadSleep))
    }

    /// Current reading of the underlying clock
    pub fn now_millis(&self) -> u64 {
        self.time_source.now_millis()
    }

    /// Sleeps until at least `millis` have elapsed on the time source
    ///
    /// Interrupted sleeps are retried for the remainder. Any other sleep
    /// failure aborts the wait and is returned.
    pub fn for_millis(&self, millis: u64) -> Result<(), SleepError> {
        let mut now = self.time_source.now_millis();
        let till = now.saturating_add(millis);
        while till > now {
            match self.sleep_method.sleep_millis(till - now) {
                Ok(()) => {}
                Err(SleepError::Interrupted) => {
                    tracing::trace!("sleep interrupted with {}ms remaining", till - now);
                }
                Err(e) => return Err(e),
            }
            now = self.time_source.now_millis();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Sleeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sleeper")
            .field("time_source", &"<TimeSource>")
            .field("sleep_method", &"<SleepMethod>")
            .finish()
    }
}

impl Default for Sleeper {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records `g` for each clock read and `a<n>` for each sleep, advancing
    /// the clock by `advance` per sleep.
    struct Recorder {
        now: Mutex<u64>,
        calls: Mutex<String>,
        advance: u64,
        fail_next: Mutex<Option<SleepError>>,
    }

    impl Recorder {
        fn new(advance: u64) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(1_000),
                calls: Mutex::new(String::new()),
                advance,
                fail_next: Mutex::new(None),
            })
        }

        fn calls(&self) -> String {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TimeSource for Recorder {
        fn now_millis(&self) -> u64 {
            self.calls.lock().unwrap().push('g');
            *self.now.lock().unwrap()
        }
    }

    impl SleepMethod for Recorder {
        fn sleep_millis(&self, millis: u64) -> Result<(), SleepError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push_str(&format!("a{millis}"));
            *self.now.lock().unwrap() += self.advance;
            match self.fail_next.lock().unwrap().take() {
                Some(SleepError::Interrupted) => {
                    calls.push_str("(Interrupted)");
                    Err(SleepError::Interrupted)
                }
                Some(e) => {
                    calls.push_str("(Failed)");
                    Err(e)
                }
                None => Ok(()),
            }
        }
    }

    fn sleeper(recorder: &Arc<Recorder>) -> Sleeper {
        Sleeper::new(recorder.clone(), recorder.clone())
    }

    #[test]
    fn test_sleeps_remaining_until_clock_catches_up() {
        let recorder = Recorder::new(2);
        sleeper(&recorder).for_millis(6).unwrap();
        assert_eq!(recorder.calls(), "ga6ga4ga2g");
    }

    #[test]
    fn test_failure_aborts_wait() {
        let recorder = Recorder::new(2);
        *recorder.fail_next.lock().unwrap() = Some(SleepError::Failed("boom".into()));
        let result = sleeper(&recorder).for_millis(6);
        assert!(matches!(result, Err(SleepError::Failed(_))));
        assert_eq!(recorder.calls(), "ga6(Failed)");
    }

    #[test]
    fn test_interrupt_is_swallowed() {
        let recorder = Recorder::new(2);
        *recorder.fail_next.lock().unwrap() = Some(SleepError::Interrupted);
        sleeper(&recorder).for_millis(6).unwrap();
        assert_eq!(recorder.calls(), "ga6(Interrupted)ga4ga2g");
    }

    #[test]
    fn test_zero_millis_does_not_sleep() {
        let recorder = Recorder::new(2);
        sleeper(&recorder).for_millis(0).unwrap();
        assert_eq!(recorder.calls(), "g");
    }
}
