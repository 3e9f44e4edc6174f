// ============================================
// TIMING UTILITY - Stage durations
// ============================================
// Usage:
//   1. Manual tracking: let timer = Timer::start("name"); ... timer.stop();
//   2. Async wrapper: let result = timed_async("name", || async { ... }).await;
//   3. Quiet timer: Timer::start_with_threshold("name", 500) logs only slow runs
// ============================================

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logs how long a named stage took, on `stop()` or on drop
pub struct Timer {
    name: String,
    start: Instant,
    threshold_ms: u128,
    logged: bool,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self::start_with_threshold(name, 0)
    }

    /// Only log if execution exceeds `threshold_ms`
    pub fn start_with_threshold(name: impl Into<String>, threshold_ms: u128) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            threshold_ms,
            logged: false,
        }
    }

    /// Stop the timer and log the result
    pub fn stop(mut self) -> Duration {
        let duration = self.start.elapsed();
        self.log_duration(duration);
        self.logged = true;
        duration
    }

    fn log_duration(&self, duration: Duration) {
        let ms = duration.as_millis();
        if ms < self.threshold_ms {
            return;
        }

        match Self::speed(ms) {
            Speed::Fast => debug!(stage = %self.name, elapsed_ms = ms as u64, "Stage finished"),
            Speed::Acceptable => info!(stage = %self.name, elapsed_ms = ms as u64, "Stage finished"),
            Speed::Slow => warn!(stage = %self.name, elapsed_ms = ms as u64, "Slow stage"),
        }
    }

    fn speed(ms: u128) -> Speed {
        match ms {
            0..=500 => Speed::Fast,
            501..=5000 => Speed::Acceptable,
            _ => Speed::Slow,
        }
    }

    /// Time an async function
    pub async fn measure_async<F, Fut, R>(name: impl Into<String>, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let timer = Self::start(name);
        let result = f().await;
        timer.stop();
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speed {
    Fast,
    Acceptable,
    Slow,
}

// Auto-log on drop unless already stopped
impl Drop for Timer {
    fn drop(&mut self) {
        if !self.logged {
            let duration = self.start.elapsed();
            self.log_duration(duration);
        }
    }
}

/// Time an async function (shorthand)
pub async fn timed_async<F, Fut, R>(name: impl Into<String>, f: F) -> R
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = R>,
{
    Timer::measure_async(name, f).await
}
