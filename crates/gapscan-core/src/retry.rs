//! Retry backoff for provider calls.

use std::time::Duration;

use crate::provider::ProviderErrorKind;

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed { delay: Duration },
    /// Exponential delay: `base * (factor ^ attempt)`, capped at `max`,
    /// with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(5),
            factor: 2.0,
            max: Duration::from_secs(120),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay for a 0-based retry attempt.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let mut delay = Duration::from_secs_f64(seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total = delay.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Action decided by the retry policy for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep for the given duration, then retry.
    RetryAfter(Duration),
    /// Stop retrying and surface the failure.
    GiveUp,
}

/// Retry configuration for the per-symbol fetch.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Extra flat delay added on top of backoff when the provider signaled
    /// throttling.
    pub rate_limit_penalty: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            rate_limit_penalty: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn exponential(base: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base,
                factor: 2.0,
                max: Duration::from_secs(120),
                jitter: false,
            },
            ..Self::default()
        }
    }

    /// Pure retry policy: `(error kind, attempt) -> action`.
    pub fn action_for(&self, kind: ProviderErrorKind, attempt: u32) -> RetryAction {
        let retryable = matches!(
            kind,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Transient
        );
        if !retryable || attempt >= self.max_retries {
            return RetryAction::GiveUp;
        }

        let mut delay = self.backoff.delay(attempt);
        if kind == ProviderErrorKind::RateLimited {
            delay += self.rate_limit_penalty;
        }
        RetryAction::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_per_attempt() {
        let config = RetryConfig::exponential(Duration::from_secs(5), 3);

        assert_eq!(
            config.action_for(ProviderErrorKind::Transient, 0),
            RetryAction::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            config.action_for(ProviderErrorKind::Transient, 1),
            RetryAction::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(
            config.action_for(ProviderErrorKind::Transient, 2),
            RetryAction::RetryAfter(Duration::from_secs(20))
        );
        assert_eq!(
            config.action_for(ProviderErrorKind::Transient, 3),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn rate_limit_adds_penalty_delay() {
        let config = RetryConfig::exponential(Duration::from_secs(5), 3);

        assert_eq!(
            config.action_for(ProviderErrorKind::RateLimited, 0),
            RetryAction::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(
            config.action_for(ProviderErrorKind::RateLimited, 1),
            RetryAction::RetryAfter(Duration::from_secs(15))
        );
    }

    #[test]
    fn data_errors_never_retry() {
        let config = RetryConfig::default();
        assert_eq!(
            config.action_for(ProviderErrorKind::Data, 0),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(5),
            factor: 2.0,
            max: Duration::from_secs(40),
            jitter: false,
        };
        assert_eq!(backoff.delay(5), Duration::from_secs(40));
    }

    #[test]
    fn jitter_stays_within_half_band() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let delay = backoff.delay(attempt).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                assert!(delay >= expected * 0.49, "attempt={attempt}, delay={delay}");
                assert!(delay <= expected * 1.51, "attempt={attempt}, delay={delay}");
            }
        }
    }
}
