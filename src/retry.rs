use std::thread;
use std::time::Duration;

use tracing::debug;

/// Fixed-interval bounded polling. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Returned when every attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
}

/// Call `check` until it returns `true`, at most
/// `policy.max_attempts` times, sleeping `policy.interval` between
/// attempts. Returns the attempt number that succeeded.
pub fn poll<F>(policy: RetryPolicy, label: &str, mut check: F) -> Result<u32, Exhausted>
where
    F: FnMut() -> bool,
{
    let max = policy.max_attempts;
    for attempt in 1..=max {
        if check() {
            eprintln!("✅ {label} ready ({attempt}/{max})");
            return Ok(attempt);
        }
        debug!(label, attempt, max, "not ready");
        if attempt < max {
            eprintln!("⏳ Waiting for {label} ({attempt}/{max})...");
            thread::sleep(policy.interval);
        }
    }

    Err(Exhausted { attempts: max })
}
