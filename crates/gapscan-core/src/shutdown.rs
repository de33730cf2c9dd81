//! Cooperative shutdown flag shared across the scan loop and its sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Poll quantum for interruptible sleeps; bounds shutdown latency inside
/// long backoff waits.
const SLEEP_QUANTUM: Duration = Duration::from_millis(500);

/// Cloneable shutdown signal. Setting it never interrupts an in-flight
/// request, only the sleeps between them.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if shutdown is triggered.
    /// Returns `true` when the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if self.is_triggered() {
                return false;
            }
            let step = remaining.min(SLEEP_QUANTUM);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
        !self.is_triggered()
    }
}
