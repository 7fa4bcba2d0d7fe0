//! Retry while a model warms up.
//!
//! The service answers "try again" while a cold model is loading. Calls
//! wrapped in [`WarmupRetry`] are repeated until they succeed, fail with
//! any other error, or the optional timeout has elapsed.

use engine_ox_common::RequestError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default pause between attempts
pub const DEFAULT_WARMUP_INTERVAL: Duration = Duration::from_millis(250);

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Where a retried call currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    Succeeded,
    TransientFailure,
    TerminalFailure,
}

/// Bookkeeping for one wrapped call
struct Attempts<'c, C: ?Sized> {
    clock: &'c C,
    start: Instant,
    deadline: Option<Instant>,
    attempts: u32,
    state: RetryState,
}

impl<'c, C: Clock + ?Sized> Attempts<'c, C> {
    fn start(clock: &'c C, timeout: Option<Duration>) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            // A timeout too large to represent never expires
            deadline: timeout.and_then(|timeout| start.checked_add(timeout)),
            attempts: 0,
            state: RetryState::Attempting,
        }
    }

    /// Feed the outcome of one attempt; `Some` once the call is settled
    fn record<T>(&mut self, outcome: Result<T, RequestError>) -> Option<Result<T, RequestError>> {
        debug_assert_eq!(self.state, RetryState::Attempting);
        self.attempts += 1;

        match outcome {
            Ok(value) => {
                self.state = RetryState::Succeeded;
                Some(Ok(value))
            }
            Err(err) if err.is_try_again() => {
                self.state = RetryState::TransientFailure;
                let now = self.clock.now();

                if self.deadline.is_some_and(|deadline| now > deadline) {
                    self.state = RetryState::TerminalFailure;
                    tracing::warn!(
                        attempts = self.attempts,
                        elapsed_ms = now.duration_since(self.start).as_millis(),
                        "model still warming up, giving up"
                    );
                    return Some(Err(err));
                }

                tracing::info!(
                    attempt = self.attempts,
                    elapsed_ms = now.duration_since(self.start).as_millis(),
                    error = %err,
                    "waiting for model to warm up"
                );
                self.state = RetryState::Attempting;
                None
            }
            Err(err) => {
                self.state = RetryState::TerminalFailure;
                Some(Err(err))
            }
        }
    }
}

/// Repeats a call while the server reports the model is warming up
#[derive(Debug, Clone)]
pub struct WarmupRetry<C = SystemClock> {
    timeout: Option<Duration>,
    interval: Duration,
    clock: C,
}

impl WarmupRetry {
    /// `None` retries for as long as the server keeps asking
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            interval: DEFAULT_WARMUP_INTERVAL,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> WarmupRetry<C> {
    /// Pause between attempts; zero only yields
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> WarmupRetry<D> {
        WarmupRetry {
            timeout: self.timeout,
            interval: self.interval,
            clock,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut attempts = Attempts::start(&self.clock, self.timeout);
        loop {
            if let Some(result) = attempts.record(operation().await) {
                return result;
            }
            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.interval).await;
            }
        }
    }

    pub fn run_blocking<T, F>(&self, mut operation: F) -> Result<T, RequestError>
    where
        F: FnMut() -> Result<T, RequestError>,
    {
        let mut attempts = Attempts::start(&self.clock, self.timeout);
        loop {
            if let Some(result) = attempts.record(operation()) {
                return result;
            }
            if self.interval.is_zero() {
                std::thread::yield_now();
            } else {
                std::thread::sleep(self.interval);
            }
        }
    }
}
