//! The polling engine: run a condition until it settles or time runs out.

use crate::access::{AccessError, ErrorKind};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default timeout for a single wait (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default sleep between two probe invocations (500ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Timing and error policy for one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    timeout: Duration,
    poll_interval: Duration,
    ignored: HashSet<ErrorKind>,
}

impl PollConfig {
    /// Fails when `poll_interval` is zero.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Result<Self> {
        Self::with_timeout(timeout).every(poll_interval)
    }

    /// Custom timeout with the default poll interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn every(mut self, poll_interval: Duration) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be greater than zero".into()));
        }
        self.poll_interval = poll_interval;
        Ok(self)
    }

    /// Treat failures of this kind as "not yet". `Fatal` cannot be ignored.
    pub fn ignoring(mut self, kind: ErrorKind) -> Self {
        if kind.is_transient() {
            self.ignored.insert(kind);
        }
        self
    }

    /// Abort on failures of this kind instead of retrying.
    pub fn not_ignoring(mut self, kind: ErrorKind) -> Self {
        self.ignored.remove(&kind);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn ignores(&self, kind: ErrorKind) -> bool {
        self.ignored.contains(&kind)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ignored: [ErrorKind::TransientNotFound, ErrorKind::TransientStale]
                .into_iter()
                .collect(),
        }
    }
}

/// What one probe invocation observed.
#[derive(Debug)]
pub enum ProbeResult<T> {
    /// Not there yet, keep polling.
    Pending,
    /// Definitive answer, stop polling.
    Success(T),
    /// The accessor failed; the poll config decides whether to retry.
    Failure(AccessError),
}

impl ProbeResult<bool> {
    /// `true` settles the poll, `false` keeps it going.
    pub fn from_bool(done: bool) -> Self {
        if done {
            ProbeResult::Success(true)
        } else {
            ProbeResult::Pending
        }
    }
}

impl<T> From<Option<T>> for ProbeResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => ProbeResult::Success(v),
            None => ProbeResult::Pending,
        }
    }
}

impl<T> From<AccessError> for ProbeResult<T> {
    fn from(e: AccessError) -> Self {
        ProbeResult::Failure(e)
    }
}

type ProbeFn<'c, A, T> = Box<dyn Fn(&A) -> ProbeResult<T> + 'c>;

/// A described probe. The description shows up in logs and timeout errors.
pub struct Condition<'c, A: ?Sized, T> {
    description: String,
    probe: ProbeFn<'c, A, T>,
}

impl<'c, A: ?Sized, T> Condition<'c, A, T> {
    pub fn new<F>(description: impl Into<String>, probe: F) -> Self
    where
        F: Fn(&A) -> ProbeResult<T> + 'c,
    {
        Self {
            description: description.into(),
            probe: Box::new(probe),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the probe once.
    pub fn check(&self, accessor: &A) -> ProbeResult<T> {
        (self.probe)(accessor)
    }
}

impl<A: ?Sized, T> fmt::Debug for Condition<'_, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<A: ?Sized, T> fmt::Display for Condition<'_, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// How a poll ended, short of a fatal error.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Success(T),
    TimedOut {
        /// Swallowed transient error from the final attempt, if any.
        last_error: Option<AccessError>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<T> PollOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, PollOutcome::TimedOut { .. })
    }

    pub fn ok(self) -> Option<T> {
        match self {
            PollOutcome::Success(v) => Some(v),
            PollOutcome::TimedOut { .. } => None,
        }
    }

    /// Turn a timeout into [`Error::Timeout`].
    pub fn into_result(self, condition: &str, timeout: Duration) -> Result<T> {
        match self {
            PollOutcome::Success(v) => Ok(v),
            PollOutcome::TimedOut { last_error, .. } => Err(Error::Timeout {
                condition: condition.to_string(),
                timeout,
                last_error,
            }),
        }
    }
}

/// Tracks one poll between attempts. Shared by the sync and async loops.
struct Attempts {
    start: Instant,
    count: u32,
    last_error: Option<AccessError>,
}

enum Step<T> {
    Done(std::result::Result<PollOutcome<T>, AccessError>),
    Sleep(Duration),
}

impl Attempts {
    fn start() -> Self {
        Self {
            start: Instant::now(),
            count: 0,
            last_error: None,
        }
    }

    fn record<T>(
        &mut self,
        result: ProbeResult<T>,
        description: &str,
        config: &PollConfig,
    ) -> Step<T> {
        self.count += 1;
        match result {
            ProbeResult::Success(v) => {
                debug!("'{}' satisfied after {} attempt(s)", description, self.count);
                return Step::Done(Ok(PollOutcome::Success(v)));
            }
            ProbeResult::Pending => {
                self.last_error = None;
            }
            ProbeResult::Failure(e) if config.ignores(e.kind()) => {
                trace!("'{}' attempt {}: ignoring {}", description, self.count, e);
                self.last_error = Some(e);
            }
            ProbeResult::Failure(e) => {
                warn!("'{}' aborted on attempt {}: {}", description, self.count, e);
                return Step::Done(Err(e));
            }
        }

        let elapsed = self.start.elapsed();
        if elapsed >= config.timeout {
            debug!(
                "'{}' timed out after {:?} ({} attempts)",
                description, elapsed, self.count
            );
            return Step::Done(Ok(PollOutcome::TimedOut {
                last_error: self.last_error.take(),
                attempts: self.count,
                elapsed,
            }));
        }
        Step::Sleep(config.poll_interval.min(config.timeout - elapsed))
    }
}

/// Run `condition` against `accessor` until it succeeds, fails fatally or
/// `config.timeout` elapses. Blocks the calling thread between attempts.
///
/// The deadline is checked between attempts, so a slow probe can overrun the
/// timeout by one probe duration. A zero timeout checks exactly once.
pub fn poll<A, T>(
    accessor: &A,
    condition: &Condition<'_, A, T>,
    config: &PollConfig,
) -> std::result::Result<PollOutcome<T>, AccessError>
where
    A: ?Sized,
{
    debug!("waiting up to {:?} for {}", config.timeout, condition.description);
    let mut attempts = Attempts::start();
    loop {
        match attempts.record(condition.check(accessor), &condition.description, config) {
            Step::Done(outcome) => return outcome,
            Step::Sleep(d) => std::thread::sleep(d),
        }
    }
}

/// Same as [`poll`] but sleeps on the tokio timer instead of the thread.
#[cfg(feature = "async")]
pub async fn poll_async<A, T>(
    accessor: &A,
    condition: &Condition<'_, A, T>,
    config: &PollConfig,
) -> std::result::Result<PollOutcome<T>, AccessError>
where
    A: ?Sized,
{
    debug!("waiting up to {:?} for {}", config.timeout, condition.description);
    let mut attempts = Attempts::start();
    loop {
        match attempts.record(condition.check(accessor), &condition.description, config) {
            Step::Done(outcome) => return outcome,
            Step::Sleep(d) => tokio::time::sleep(d).await,
        }
    }
}
