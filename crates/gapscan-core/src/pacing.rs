//! Request pacing for the sequential scan loop.
//!
//! Two layers keep the provider call rate bounded: a deterministic delay
//! schedule (fixed inter-request delay, periodic cooldown, adaptive cooldown
//! after failure streaks) and a `governor` token bucket as a hard ceiling.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Pacing knobs; defaults mirror the conservative production profile.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Fixed delay between consecutive requests.
    pub request_delay: Duration,
    /// Insert `cooldown` after every this many requests.
    pub cooldown_every: u32,
    pub cooldown: Duration,
    /// Consecutive failures that trigger the adaptive cooldown.
    pub failure_streak: u32,
    pub failure_cooldown: Duration,
    /// Hard rate budget: at most `quota_limit` calls per `quota_window`.
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(10),
            cooldown_every: 3,
            cooldown: Duration::from_secs(30),
            failure_streak: 2,
            failure_cooldown: Duration::from_secs(120),
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
        }
    }
}

/// Computes the pause before each sequential request.
#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        let quota = quota_from_window(config.quota_window, config.quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            config,
        }
    }

    /// Deterministic delay before request number `request_index` (1-based)
    /// given the current consecutive-failure count.
    pub fn delay_before(&self, request_index: u32, consecutive_failures: u32) -> Duration {
        if request_index <= 1 {
            return Duration::ZERO;
        }

        let mut delay = self.config.request_delay;

        if self.config.cooldown_every > 0 && request_index % self.config.cooldown_every == 0 {
            delay += self.config.cooldown;
        }

        if self.config.failure_streak > 0 && consecutive_failures >= self.config.failure_streak {
            delay += self.config.failure_cooldown;
        }

        delay
    }

    /// Try to take one cell of the rate budget; on exhaustion the caller
    /// should wait `request_delay` and try again.
    pub fn acquire_budget(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            Ok(())
        } else {
            Err(self.config.request_delay)
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer() -> Pacer {
        Pacer::new(PacingConfig {
            request_delay: Duration::from_secs(10),
            cooldown_every: 3,
            cooldown: Duration::from_secs(30),
            failure_streak: 2,
            failure_cooldown: Duration::from_secs(120),
            quota_window: Duration::from_secs(60),
            quota_limit: 100,
        })
    }

    #[test]
    fn first_request_has_no_delay() {
        assert_eq!(pacer().delay_before(1, 0), Duration::ZERO);
    }

    #[test]
    fn steady_state_uses_fixed_delay() {
        assert_eq!(pacer().delay_before(2, 0), Duration::from_secs(10));
        assert_eq!(pacer().delay_before(4, 0), Duration::from_secs(10));
    }

    #[test]
    fn every_nth_request_adds_cooldown() {
        assert_eq!(pacer().delay_before(3, 0), Duration::from_secs(40));
        assert_eq!(pacer().delay_before(6, 0), Duration::from_secs(40));
    }

    #[test]
    fn failure_streak_adds_adaptive_cooldown() {
        assert_eq!(pacer().delay_before(2, 2), Duration::from_secs(130));
        // Streak plus periodic cooldown stack.
        assert_eq!(pacer().delay_before(3, 5), Duration::from_secs(160));
    }

    #[test]
    fn budget_exhaustion_reports_retry_delay() {
        let pacer = Pacer::new(PacingConfig {
            quota_window: Duration::from_secs(60),
            quota_limit: 2,
            ..PacingConfig::default()
        });

        assert!(pacer.acquire_budget().is_ok());
        assert!(pacer.acquire_budget().is_ok());
        let delay = pacer.acquire_budget().expect_err("budget should be spent");
        assert_eq!(delay, pacer.config().request_delay);
    }
}
