//! # Gapscan Daemon
//!
//! The background scanner process: configuration, telemetry, the scan
//! orchestrator, and the `gapscand` binary entry point.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cli`] | Command-line flags |
//! | [`config`] | Environment-driven configuration |
//! | [`error`] | Daemon errors and exit codes |
//! | [`orchestrator`] | The periodic scan loop |
//! | [`telemetry`] | Tracing setup |

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod telemetry;

pub use cli::Cli;
pub use config::ScannerConfig;
pub use error::{ConfigError, DaemonError};
pub use orchestrator::{ScanRun, Scanner};
