//! Exponential backoff with jitter for retry loops.

use std::ops::ControlFlow;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Distinguishes "the broker asked us to slow down" from a genuine error so a
/// retry loop can honor `throttle_time_ms` without treating it as a failure.
#[derive(Debug)]
pub enum ErrorOrThrottle<E> {
    Error(E),
    Throttle(Duration),
}

impl<E> From<E> for ErrorOrThrottle<E> {
    fn from(e: E) -> Self {
        Self::Error(e)
    }
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial backoff.
    pub init_backoff: Duration,

    /// Maximum backoff.
    pub max_backoff: Duration,

    /// Multiplier applied to the backoff after every failed attempt.
    pub base: f64,

    /// Total time budget across all attempts, or `None` for unbounded retries.
    pub deadline: Option<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(500),
            base: 3.0,
            deadline: Some(Duration::from_secs(10 * 60)),
        }
    }
}

/// Raised when a retry loop exceeds its configured deadline.
///
/// `source` is `None` when the last thing the operation reported was a
/// broker-requested throttle rather than an error -- there is no error to
/// carry in that case, only a budget that ran out while waiting it out.
#[derive(Debug)]
pub struct BackoffError<E> {
    pub total: Duration,
    pub deadline: Duration,
    pub source: Option<E>,
}

impl<E: std::fmt::Display> std::fmt::Display for BackoffError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(
                f,
                "gave up after {:?}, budget was {:?}: {source}",
                self.total, self.deadline
            ),
            None => write!(
                f,
                "gave up after {:?} waiting out broker throttling, budget was {:?}",
                self.total, self.deadline
            ),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for BackoffError<E> {}

/// An exponential-backoff-with-jitter retry driver for a single logical
/// operation, e.g. one call to `ControllerClient::create_topic`.
#[derive(Debug)]
pub struct Backoff {
    init_backoff: f64,
    next_backoff_secs: f64,
    max_backoff_secs: f64,
    base: f64,
    deadline: Option<Duration>,
    total: Duration,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let init_backoff = config.init_backoff.as_secs_f64();
        Self {
            init_backoff,
            next_backoff_secs: init_backoff,
            max_backoff_secs: config.max_backoff.as_secs_f64(),
            base: config.base,
            deadline: config.deadline,
            total: Duration::ZERO,
        }
    }

    /// Resets the backoff to its initial state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.next_backoff_secs = self.init_backoff;
        self.total = Duration::ZERO;
    }

    /// Returns the next jittered backoff duration and advances the internal
    /// exponent, without retrying anything itself -- used by loops that need
    /// to interleave a sleep with other work (e.g. `client::partition`'s
    /// fetch loop, which must also watch for cancellation while waiting).
    pub(crate) fn next(&mut self) -> Duration {
        let jittered = rand::thread_rng().gen_range(self.next_backoff_secs..(self.next_backoff_secs * self.base));
        self.next_backoff_secs = (self.next_backoff_secs * self.base).min(self.max_backoff_secs);
        Duration::from_secs_f64(jittered)
    }

    /// Drives `f` until it signals [`ControlFlow::Break`], retrying on
    /// [`ControlFlow::Continue`] after sleeping for a backoff (or the
    /// broker-requested throttle duration).
    ///
    /// Returns [`BackoffError`] wrapping the last observed error if the
    /// configured deadline is exceeded first.
    pub async fn retry_with_backoff<T, E, R, F>(
        &mut self,
        request_name: &str,
        mut f: R,
    ) -> Result<T, BackoffError<E>>
    where
        R: FnMut() -> F,
        F: std::future::Future<Output = ControlFlow<T, ErrorOrThrottle<E>>>,
    {
        loop {
            match f().await {
                ControlFlow::Break(t) => return Ok(t),
                ControlFlow::Continue(err_or_throttle) => {
                    let (wait, source) = match err_or_throttle {
                        ErrorOrThrottle::Throttle(d) => (d, None),
                        ErrorOrThrottle::Error(e) => (self.next(), Some(e)),
                    };

                    if let Some(deadline) = self.deadline {
                        if self.total + wait > deadline {
                            return Err(BackoffError {
                                total: self.total,
                                deadline,
                                source,
                            });
                        }
                    }

                    warn!(request_name, wait_secs = wait.as_secs_f64(), "retrying request");
                    self.total += wait;
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_without_retry() {
        let mut backoff = Backoff::new(&BackoffConfig::default());
        let got: Result<i32, BackoffError<()>> = backoff
            .retry_with_backoff("test", || async { ControlFlow::Break(42) })
            .await;
        assert_eq!(got.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_deadline() {
        let config = BackoffConfig {
            init_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            base: 2.0,
            deadline: Some(Duration::from_millis(5)),
        };
        let mut backoff = Backoff::new(&config);
        let mut attempts = 0;
        let got: Result<(), BackoffError<&str>> = backoff
            .retry_with_backoff("test", || {
                attempts += 1;
                async { ControlFlow::Continue(ErrorOrThrottle::Error("nope")) }
            })
            .await;
        assert!(got.is_err());
        assert!(attempts > 1);
    }

    /// A deadline that runs out while the broker only ever throttles (never
    /// returns a real error) must still surface `BackoffError` instead of
    /// panicking on a missing source.
    #[tokio::test]
    async fn deadline_exceeded_by_throttling_alone_carries_no_source() {
        let config = BackoffConfig {
            init_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            base: 2.0,
            deadline: Some(Duration::from_millis(5)),
        };
        let mut backoff = Backoff::new(&config);
        let got: Result<(), BackoffError<&str>> = backoff
            .retry_with_backoff("test", || async {
                ControlFlow::Continue(ErrorOrThrottle::Throttle(Duration::from_millis(50)))
            })
            .await;

        let err = got.unwrap_err();
        assert!(err.source.is_none());
        // Must not panic while formatting a throttle-only timeout.
        assert!(err.to_string().contains("waiting out broker throttling"));
    }
}
