//! Command-line flags; each one overrides its environment counterpart.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::ScannerConfig;

#[derive(Debug, Parser)]
#[command(name = "gapscand", about = "Background stock gap scanner", version)]
pub struct Cli {
    /// Seconds between scan passes.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Universe size cap per scan.
    #[arg(long, value_name = "N")]
    pub max_symbols: Option<usize>,

    /// Cache document path.
    #[arg(long, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// Instance lock file path.
    #[arg(long, value_name = "PATH")]
    pub lock_path: Option<PathBuf>,

    /// Run a single scan pass and exit.
    #[arg(long)]
    pub once: bool,

    /// Use the deterministic offline provider instead of the live API.
    #[arg(long)]
    pub offline: bool,
}

impl Cli {
    pub fn apply(&self, config: &mut ScannerConfig) {
        if let Some(secs) = self.interval {
            config.scan_interval = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_symbols {
            config.max_symbols = max;
        }
        if let Some(path) = &self.cache_path {
            config.cache_path = path.clone();
        }
        if let Some(path) = &self.lock_path {
            config.lock_path = path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "gapscand",
            "--interval",
            "60",
            "--max-symbols",
            "10",
            "--cache-path",
            "/tmp/c.json",
        ]);

        let mut config = ScannerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.max_symbols, 10);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/c.json"));
        assert_eq!(config.lock_path, ScannerConfig::default().lock_path);
    }
}
