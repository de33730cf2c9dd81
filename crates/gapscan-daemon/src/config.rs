//! Daemon configuration from `GAPSCAN_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use gapscan_core::pacing::PacingConfig;
use gapscan_core::retry::RetryConfig;
use gapscan_store::FreshnessThresholds;

use crate::error::ConfigError;

/// Complete scanner configuration with production defaults.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Wall-clock pause between scan passes.
    pub scan_interval: Duration,
    /// Universe size cap per scan.
    pub max_symbols: usize,
    pub request_delay: Duration,
    pub cooldown_every: u32,
    pub cooldown: Duration,
    pub failure_cooldown: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub cache_path: PathBuf,
    pub lock_path: PathBuf,
    /// Skip the startup scan when the existing cache is this fresh.
    pub freshness: FreshnessThresholds,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(600),
            max_symbols: 50,
            request_delay: Duration::from_secs(10),
            cooldown_every: 3,
            cooldown: Duration::from_secs(30),
            failure_cooldown: Duration::from_secs(120),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(5),
            cache_path: PathBuf::from("stock_cache.json"),
            lock_path: PathBuf::from("gapscand.pid"),
            freshness: FreshnessThresholds::default(),
        }
    }
}

impl ScannerConfig {
    /// Read configuration from `GAPSCAN_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            scan_interval: env_secs("GAPSCAN_SCAN_INTERVAL_SECS", defaults.scan_interval)?,
            max_symbols: env_parse("GAPSCAN_MAX_SYMBOLS", defaults.max_symbols)?,
            request_delay: env_secs("GAPSCAN_REQUEST_DELAY_SECS", defaults.request_delay)?,
            cooldown_every: env_parse("GAPSCAN_COOLDOWN_EVERY", defaults.cooldown_every)?,
            cooldown: env_secs("GAPSCAN_COOLDOWN_SECS", defaults.cooldown)?,
            failure_cooldown: env_secs(
                "GAPSCAN_FAILURE_COOLDOWN_SECS",
                defaults.failure_cooldown,
            )?,
            max_retries: env_parse("GAPSCAN_MAX_RETRIES", defaults.max_retries)?,
            retry_base_delay: env_secs(
                "GAPSCAN_RETRY_BASE_DELAY_SECS",
                defaults.retry_base_delay,
            )?,
            cache_path: env_path("GAPSCAN_CACHE_PATH", defaults.cache_path),
            lock_path: env_path("GAPSCAN_LOCK_PATH", defaults.lock_path),
            freshness: FreshnessThresholds {
                fresh: env_secs("GAPSCAN_FRESH_SECS", defaults.freshness.fresh)?,
                stale: env_secs("GAPSCAN_STALE_SECS", defaults.freshness.stale)?,
            },
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::exponential(self.retry_base_delay, self.max_retries)
    }

    pub fn pacing_config(&self) -> PacingConfig {
        PacingConfig {
            request_delay: self.request_delay,
            cooldown_every: self.cooldown_every,
            cooldown: self.cooldown,
            failure_cooldown: self.failure_cooldown,
            ..PacingConfig::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: value.clone(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(env_parse(key, default.as_secs())?))
}

fn env_path(key: &'static str, default: PathBuf) -> PathBuf {
    std::env::var_os(key).map(PathBuf::from).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_profile() {
        let config = ScannerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(600));
        assert_eq!(config.max_symbols, 50);
        assert_eq!(config.request_delay, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(5));
    }

    #[test]
    fn freshness_thresholds_come_from_env() {
        std::env::set_var("GAPSCAN_FRESH_SECS", "120");
        std::env::set_var("GAPSCAN_STALE_SECS", "900");

        let config = ScannerConfig::from_env().expect("valid env");
        assert_eq!(config.freshness.fresh, Duration::from_secs(120));
        assert_eq!(config.freshness.stale, Duration::from_secs(900));

        std::env::remove_var("GAPSCAN_FRESH_SECS");
        std::env::remove_var("GAPSCAN_STALE_SECS");
    }

    #[test]
    fn derived_retry_config_uses_exponential_backoff() {
        use gapscan_core::provider::ProviderErrorKind;
        use gapscan_core::retry::RetryAction;

        let retry = ScannerConfig::default().retry_config();
        assert_eq!(
            retry.action_for(ProviderErrorKind::Transient, 0),
            RetryAction::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            retry.action_for(ProviderErrorKind::Transient, 2),
            RetryAction::RetryAfter(Duration::from_secs(20))
        );
    }
}
