//! Bounded exponential backoff.

use super::TransportError;
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default first delay between attempts.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(50);

/// Default ceiling for the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1000);

/// Default total time allowed for one retrieval.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempt limit for frame retrieval.
pub const DEFAULT_FRAME_MAX_ATTEMPTS: u32 = 10;

/// When to retry, and for how long.
///
/// The delay starts at `initial_delay` and doubles after every failure up to
/// `max_delay`. Retrying stops once `timeout` has elapsed or, if set, after
/// `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Header policy: bounded by time only.
    pub fn header_default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: None,
        }
    }

    /// Frame policy: bounded by time and attempt count.
    pub fn frame_default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_FRAME_MAX_ATTEMPTS),
            ..Self::header_default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay sequence for one retrieval.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay,
            max: self.max_delay,
        }
    }
}

/// Infinite sequence of doubling delays capped at a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.max);
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// Time source used by retry loops.
pub trait RetryClock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time with real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl RetryClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that advances only when slept on, recording every sleep.
///
/// Lets tests and simulations observe the backoff sequence without waiting.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(Instant, Vec<Duration>)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new((Instant::now(), Vec::new())),
        }
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().1.clone()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.state.lock().0 += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryClock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().0
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.0 += duration;
        state.1.push(duration);
    }
}

/// Final failure of a retry loop.
#[derive(Debug, Clone)]
pub(crate) struct RetryFailure {
    pub last_error: TransportError,
    pub attempts: u32,
}

/// Run `operation` until it succeeds or the policy gives up.
///
/// `on_retry` is called before every sleep. The last sleep is shortened so
/// the loop never waits past the timeout.
pub(crate) fn retry<T, F, R>(
    policy: &RetryPolicy,
    clock: &dyn RetryClock,
    what: &str,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Result<T, TransportError>,
    R: FnMut(),
{
    let start = clock.now();
    let mut delays = policy.backoff();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_error = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let elapsed = clock.now().saturating_duration_since(start);
        let attempts_exhausted = policy.max_attempts.is_some_and(|max| attempts >= max);
        if elapsed >= policy.timeout || attempts_exhausted {
            return Err(RetryFailure {
                last_error,
                attempts,
            });
        }

        let delay = delays
            .next()
            .unwrap_or(policy.max_delay)
            .min(policy.timeout - elapsed);
        warn!(
            what,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "Retrieval failed, retrying"
        );
        on_retry();
        clock.sleep(delay);
    }
}
