//! Waiting for asynchronous GitLab jobs
use std::{future::Future, pin::Pin, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::{GitlabMigrateError, GitlabMigrateErrorKind};

/// Pause between two branch operations, to stay under the rate limit
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_millis(500);

/// Source of sleeps, replaced by a fake in tests
pub trait Clock: Sync + Send {
    /// Wait for `duration`
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// [`Clock`] backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// How the delay between two checks evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Always wait the base interval
    #[default]
    Fixed,
    /// Double the delay after each check, up to `max`
    Exponential {
        /// Upper bound of the delay
        max: Duration,
    },
}

/// Polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the second check
    pub interval: Duration,

    /// Number of checks before giving up, `None` polls forever
    pub max_attempts: Option<u32>,

    /// Delay growth
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: Some(720),
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    /// Delay to wait after the `attempt`-th check (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.interval.saturating_mul(factor).min(max)
            }
        }
    }
}

/// `[polling]` section of the config file
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Seconds between two status checks
    pub interval_secs: Option<u64>,

    /// Checks before giving up, 0 polls forever
    pub max_attempts: Option<u32>,

    /// Delay growth
    pub backoff: Option<BackoffKind>,

    /// Upper bound of an exponential delay, in seconds
    pub max_interval_secs: Option<u64>,

    /// Milliseconds to wait after each branch operation
    pub rate_limit_pause_ms: Option<u64>,
}

/// Backoff name used in the config file
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// See [`Backoff::Fixed`]
    Fixed,
    /// See [`Backoff::Exponential`]
    Exponential,
}

impl PollingConfig {
    /// Policy described by the config, defaults filled in
    pub fn policy(&self) -> PollPolicy {
        let default = PollPolicy::default();
        let interval = self
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(default.interval);
        let max_attempts = match self.max_attempts {
            Some(0) => None,
            Some(max) => Some(max),
            None => default.max_attempts,
        };
        let backoff = match self.backoff {
            Some(BackoffKind::Exponential) => Backoff::Exponential {
                max: Duration::from_secs(self.max_interval_secs.unwrap_or(60)),
            },
            Some(BackoffKind::Fixed) | None => Backoff::Fixed,
        };
        PollPolicy {
            interval,
            max_attempts,
            backoff,
        }
    }

    /// Pause after each branch operation
    pub fn rate_limit_pause(&self) -> Duration {
        self.rate_limit_pause_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RATE_LIMIT_PAUSE)
    }
}

/// Result of one status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// Not done yet, with a status to log
    Pending(String),
    /// Final value
    Ready(T),
}

/// Value returned by [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    /// Final value
    pub value: T,

    /// Number of checks done
    pub attempts: u32,

    /// Time spent sleeping
    pub waited: Duration,
}

/// Call `check` until it returns [`PollState::Ready`], sleeping between calls
/// # Errors
/// Error from `check`, or a poll timeout once `max_attempts` checks are done
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    clock: &dyn Clock,
    what: &str,
    mut check: F,
) -> Result<Polled<T>, GitlabMigrateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>, GitlabMigrateError>>,
{
    let mut attempts: u32 = 0;
    let mut waited = Duration::ZERO;
    loop {
        attempts += 1;
        match check().await? {
            PollState::Ready(value) => {
                return Ok(Polled {
                    value,
                    attempts,
                    waited,
                })
            }
            PollState::Pending(status) => {
                log::info!("Waiting for {what}: {status} ({}s elapsed)", waited.as_secs());
            }
        }
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(GitlabMigrateError::new(GitlabMigrateErrorKind::PollTimeout)
                .with_text(&format!("{what} not done after {attempts} checks")));
        }
        let delay = policy.delay(attempts);
        clock.sleep(delay).await;
        waited += delay;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::FakeClock;

    #[test]
    fn exponential_delay_is_capped() {
        let policy = PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts: None,
            backoff: Backoff::Exponential {
                max: Duration::from_secs(30),
            },
        };
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(2), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(20));
        assert_eq!(policy.delay(4), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn policy_from_config() {
        assert_eq!(PollingConfig::default().policy(), PollPolicy::default());
        let config = PollingConfig {
            interval_secs: Some(2),
            max_attempts: Some(0),
            backoff: Some(BackoffKind::Exponential),
            max_interval_secs: None,
            rate_limit_pause_ms: Some(100),
        };
        let policy = config.policy();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, None);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                max: Duration::from_secs(60)
            }
        );
        assert_eq!(config.rate_limit_pause(), Duration::from_millis(100));
        assert_eq!(
            PollingConfig::default().rate_limit_pause(),
            DEFAULT_RATE_LIMIT_PAUSE
        );
    }

    #[tokio::test]
    async fn polls_until_ready() {
        let clock = FakeClock::default();
        let mut remaining = 3;
        let polled = poll_until(&PollPolicy::default(), &clock, "job", || {
            remaining -= 1;
            let state = if remaining == 0 {
                PollState::Ready("done")
            } else {
                PollState::Pending("started".to_string())
            };
            async move { Ok::<_, GitlabMigrateError>(state) }
        })
        .await
        .unwrap();
        assert_eq!(polled.value, "done");
        assert_eq!(polled.attempts, 3);
        assert_eq!(polled.waited, Duration::from_secs(10));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let clock = FakeClock::default();
        let policy = PollPolicy {
            max_attempts: Some(4),
            ..Default::default()
        };
        let result: Result<Polled<()>, _> = poll_until(&policy, &clock, "job", || async {
            Ok::<_, GitlabMigrateError>(PollState::Pending("queued".to_string()))
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), &GitlabMigrateErrorKind::PollTimeout);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn check_errors_are_not_retried() {
        let clock = FakeClock::default();
        let mut calls = 0;
        let result: Result<Polled<()>, _> = poll_until(&PollPolicy::default(), &clock, "job", || {
            calls += 1;
            async { Err::<PollState<()>, _>(GitlabMigrateError::from("boom")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }
}
