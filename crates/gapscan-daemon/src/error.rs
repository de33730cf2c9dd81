use thiserror::Error;

/// Configuration errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Daemon-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] gapscan_store::LockError),

    #[error(transparent)]
    Store(#[from] gapscan_store::StoreError),

    #[error(transparent)]
    Telemetry(#[from] crate::telemetry::TelemetryError),
}

impl DaemonError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Lock(_) => 3,
            Self::Store(_) => 4,
            Self::Telemetry(_) => 5,
        }
    }
}
