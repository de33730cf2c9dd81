//! # Gapscan Store
//!
//! Crash-safe persistence for the gapscan scanner: the file-backed cache
//! document with atomic replacement and post-write verification, freshness
//! classification, and the PID-file single-instance lock.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Store and lock error types |
//! | [`lock`] | Single-instance PID-file lock |
//! | [`models`] | Cache document schema and freshness model |
//! | [`store`] | Atomic file-backed cache store |

pub mod error;
pub mod lock;
pub mod models;
pub mod store;

pub use error::{LockError, StoreError};
pub use lock::InstanceLock;
pub use models::{
    epoch_now, Cache, CacheStatus, Freshness, FreshnessThresholds, ScanStats, ScanSummary,
};
pub use store::CacheStore;
