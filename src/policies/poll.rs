//! # Poll policy for readiness checks.
//!
//! [`PollPolicy`] decides how long a [`ServiceLoader`](crate::ServiceLoader) sleeps
//! between two inspections of the service registry.

use std::time::Duration;

use super::jitter::JitterPolicy;

/// Smallest delay handed out, so full jitter cannot degrade into a busy loop.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Poll interval plus jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Nominal delay between two polls.
    pub interval: Duration,
    /// Randomization applied to every delay.
    pub jitter: JitterPolicy,
}

impl Default for PollPolicy {
    /// `interval = 100ms`, no jitter.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            jitter: JitterPolicy::None,
        }
    }
}

impl PollPolicy {
    /// Delay before the next poll, always within `[1ms, interval]`.
    pub fn next_delay(&self) -> Duration {
        self.jitter
            .apply(self.interval)
            .clamp(MIN_DELAY, self.interval.max(MIN_DELAY))
    }
}
