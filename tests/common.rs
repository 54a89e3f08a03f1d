#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use rust_quiesce::{
    BoxError, ForceStoppable, Participant, SleepError, SleepMethod, Sleeper, Stoppable, TimeSource,
};

static INIT: Once = Once::new();

/// Sets up the tracing subscriber for tests, ensuring it's only initialized once.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().init();
    });
}

/// Polls `cond` until it holds or `timeout` passes; returns the final result
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            return cond();
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    true
}

/// Hand-driven clock and sleep that record every interaction
///
/// `g` is a clock read, `a<n>` a sleep request of n ms. Each sleep advances
/// the clock by `advance` ms regardless of how long was asked for.
pub struct Trace {
    now: Mutex<u64>,
    calls: Mutex<String>,
    advance: AtomicU64,
    sleep_failure: Mutex<Option<SleepError>>,
}

impl Trace {
    pub fn new(advance: u64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(0),
            calls: Mutex::new(String::new()),
            advance: AtomicU64::new(advance),
            sleep_failure: Mutex::new(None),
        })
    }

    pub fn sleeper(self: &Arc<Self>) -> Sleeper {
        Sleeper::new(self.clone(), self.clone())
    }

    pub fn calls(&self) -> String {
        self.calls.lock().unwrap().clone()
    }

    pub fn record(&self, entry: &str) {
        self.calls.lock().unwrap().push_str(entry);
    }

    /// Current time without recording a clock read
    pub fn peek(&self) -> u64 {
        *self.now.lock().unwrap()
    }

    pub fn fail_next_sleep(&self, failure: SleepError) {
        *self.sleep_failure.lock().unwrap() = Some(failure);
    }
}

impl TimeSource for Trace {
    fn now_millis(&self) -> u64 {
        self.record("g");
        self.peek()
    }
}

impl SleepMethod for Trace {
    fn sleep_millis(&self, millis: u64) -> Result<(), SleepError> {
        self.record(&format!("a{millis}"));
        *self.now.lock().unwrap() += self.advance.load(Ordering::SeqCst);
        match self.sleep_failure.lock().unwrap().take() {
            Some(failure) => {
                self.record("(failed)");
                Err(failure)
            }
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct MockState {
    graceful_called: bool,
    stopped: bool,
    polls_until_stopped: Option<usize>,
}

/// A participant whose every call is written to a [`Trace`]
///
/// `SG(name|t)` graceful request, `SN(name|t)` forced stop,
/// `ISD(name):bool` stopped poll.
pub struct MockParticipant {
    name: String,
    trace: Arc<Trace>,
    state: Mutex<MockState>,
    fail_graceful: bool,
    fail_force: bool,
}

impl MockParticipant {
    /// A participant that only stops when forced
    pub fn new(name: &str, trace: &Arc<Trace>) -> Self {
        Self {
            name: name.to_string(),
            trace: trace.clone(),
            state: Mutex::new(MockState::default()),
            fail_graceful: false,
            fail_force: false,
        }
    }

    /// Stops on the n-th poll after its graceful request (0 = immediately)
    pub fn stops_after_polls(self, polls: usize) -> Self {
        self.state.lock().unwrap().polls_until_stopped = Some(polls);
        self
    }

    pub fn failing_graceful(mut self) -> Self {
        self.fail_graceful = true;
        self
    }

    pub fn failing_force(mut self) -> Self {
        self.fail_force = true;
        self
    }

    pub fn forceable(self) -> (Arc<Self>, Participant) {
        let this = Arc::new(self);
        (this.clone(), Participant::forceable(this))
    }

    pub fn graceful(self) -> (Arc<Self>, Participant) {
        let this = Arc::new(self);
        (this.clone(), Participant::graceful(this))
    }

    fn stamp(&self, what: &str) {
        self.trace
            .record(&format!("{what}({}|{})", self.name, self.trace.peek()));
    }
}

impl Stoppable for MockParticipant {
    fn request_graceful_stop(&self) -> Result<(), BoxError> {
        self.stamp("SG");
        if self.fail_graceful {
            return Err(format!("{} refused graceful stop", self.name).into());
        }
        let mut state = self.state.lock().unwrap();
        if !state.graceful_called {
            state.graceful_called = true;
            state.stopped = state.polls_until_stopped == Some(0);
        }
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.graceful_called && !state.stopped {
            if let Some(polls) = state.polls_until_stopped.as_mut() {
                *polls = polls.saturating_sub(1);
                state.stopped = *polls == 0;
            }
        }
        let stopped = state.stopped;
        drop(state);
        self.trace
            .record(&format!("ISD({}):{}", self.name, stopped));
        stopped
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ForceStoppable for MockParticipant {
    fn force_stop(&self) -> Result<(), BoxError> {
        self.stamp("SN");
        if self.fail_force {
            return Err(format!("{} refused forced stop", self.name).into());
        }
        self.state.lock().unwrap().stopped = true;
        Ok(())
    }
}
