//! Retry wrapper for remote calls that may be rate limited.
//!
//! The server tells us how long to wait; we wait that long plus a second and
//! try again. Nothing else is retried here. Callers see every other error
//! unchanged.

use crate::archive::warn::{self, WarnEvent};
use crate::error::RemoteError;
use std::thread;
use std::time::Duration;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Delay before the next attempt, given the server's retry-after and the attempt number (1-based).
pub type BackoffFn = fn(Duration, u32) -> Duration;

pub fn retry_after_plus_one(retry_after: Duration, _attempt: u32) -> Duration {
    retry_after + Duration::from_secs(1)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed per call. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff: BackoffFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: retry_after_plus_one,
        }
    }
}

impl RetryPolicy {
    /// Zero keeps the unbounded default; any other value caps retries after the first attempt.
    pub fn from_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: (max_retries > 0).then(|| max_retries.saturating_add(1)),
            ..Self::default()
        }
    }
}

pub struct RateLimitedExecutor<S: Sleeper = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RateLimitedExecutor<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: ThreadSleeper,
        }
    }
}

impl<S: Sleeper> RateLimitedExecutor<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// Run `call`, sleeping through rate limits. `action` and `stream` only label warn events.
    pub fn execute<T, F>(&self, action: &str, stream: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let retry_after = match call() {
                Err(RemoteError::RateLimited { retry_after }) => retry_after,
                other => return other,
            };

            if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                warn::emit(WarnEvent {
                    code: "E006_RATE_LIMITED",
                    stage: "fetch",
                    action,
                    stream,
                    retry: "abort",
                    reason: "rate-limit-retries-exhausted",
                    err: &format!("attempts={attempt}"),
                });
                return Err(RemoteError::RateLimitExhausted { attempts: attempt });
            }

            let delay = (self.policy.backoff)(retry_after, attempt);
            warn::emit(WarnEvent {
                code: "E006_RATE_LIMITED",
                stage: "fetch",
                action,
                stream,
                retry: &format!("sleep-{}ms", delay.as_millis()),
                reason: "rate-limit-hit",
                err: &format!("retry_after={retry_after:?} attempt={attempt}"),
            });
            self.sleeper.sleep(delay);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;
    use crate::zulip::fake::rate_limited;
    use std::cell::Cell;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn retries_rate_limits_and_sleeps_retry_after_plus_one() {
        let sleeper = RecordingSleeper::default();
        let executor = RateLimitedExecutor::with_sleeper(RetryPolicy::default(), &sleeper);
        let calls = Cell::new(0);

        let got = executor
            .execute("messages", "general", || {
                calls.set(calls.get() + 1);
                match calls.get() {
                    1 => Err(rate_limited(3)),
                    2 => Err(rate_limited(0)),
                    _ => Ok(42),
                }
            })
            .expect("eventually succeeds");

        assert_eq!(got, 42);
        assert_eq!(calls.get(), 3);
        assert_eq!(
            *sleeper.slept.borrow(),
            vec![Duration::from_secs(4), Duration::from_secs(1)]
        );
    }

    #[test]
    fn does_not_retry_other_errors() {
        let sleeper = RecordingSleeper::default();
        let executor = RateLimitedExecutor::with_sleeper(RetryPolicy::default(), &sleeper);
        let calls = Cell::new(0);

        let err = executor
            .execute("messages", "general", || -> Result<(), RemoteError> {
                calls.set(calls.get() + 1);
                Err(RemoteError::Api {
                    code: "BAD_REQUEST".into(),
                    message: "boom".into(),
                })
            })
            .expect_err("propagates");

        assert!(matches!(err, RemoteError::Api { .. }));
        assert_eq!(calls.get(), 1);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn bounded_policy_gives_up() {
        let sleeper = RecordingSleeper::default();
        let executor = RateLimitedExecutor::with_sleeper(RetryPolicy::from_max_retries(2), &sleeper);
        let calls = Cell::new(0);

        let err = executor
            .execute("streams", "", || -> Result<(), RemoteError> {
                calls.set(calls.get() + 1);
                Err(rate_limited(1))
            })
            .expect_err("exhausted");

        assert!(matches!(err, RemoteError::RateLimitExhausted { attempts: 3 }));
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.slept.borrow().len(), 2);
    }

    #[test]
    fn custom_backoff_is_applied() {
        fn doubled(retry_after: Duration, attempt: u32) -> Duration {
            retry_after * attempt * 2
        }
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: None,
            backoff: doubled,
        };
        let executor = RateLimitedExecutor::with_sleeper(policy, &sleeper);
        let calls = Cell::new(0);

        executor
            .execute("messages", "general", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err(rate_limited(1)) } else { Ok(()) }
            })
            .expect("ok");

        assert_eq!(
            *sleeper.slept.borrow(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rate_limit_warnings_name_the_stream() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let sleeper = RecordingSleeper::default();
        let executor = RateLimitedExecutor::with_sleeper(RetryPolicy::default(), &sleeper);
        let calls = Cell::new(0);

        tracing::subscriber::with_default(subscriber, || {
            executor
                .execute("messages", "design team", || {
                    calls.set(calls.get() + 1);
                    if calls.get() == 1 { Err(rate_limited(1)) } else { Ok(()) }
                })
                .expect("ok");
        });

        let out = String::from_utf8(log.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(out.contains("stream=design_team"), "{out}");
        assert!(out.contains("action=messages"), "{out}");
    }

    #[test]
    fn zero_max_retries_means_unbounded() {
        assert!(RetryPolicy::from_max_retries(0).max_attempts.is_none());
        assert_eq!(RetryPolicy::from_max_retries(5).max_attempts, Some(6));
    }
}
