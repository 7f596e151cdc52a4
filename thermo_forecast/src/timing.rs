//! Explicit execution-time measurement

use std::time::{Duration, Instant};
use tracing::info;

/// Emits the elapsed time of a scope when dropped
#[derive(Debug)]
pub struct ScopedTimer {
    label: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        info!(
            label = %self.label,
            elapsed = ?self.start.elapsed(),
            "execution time"
        );
    }
}

/// Run `f` and log how long it took under `label`
pub fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let _timer = ScopedTimer::start(label);
    f()
}
