//! Pure backoff policy for reconnection attempts
//!
//! Attempt `n` (starting at 1) waits `min(base * n, cap)` before connecting.
//! Nothing in this module performs I/O.

use crate::config::ReconnectSection;
use std::time::Duration;

/// Linear backoff with a ceiling and a bounded attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per reconnection episode
    pub max_retries: u32,
    /// Delay before attempt 1
    pub base_delay: Duration,
    /// Largest delay ever returned
    pub cap_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(5),
            cap_delay: Duration::from_secs(30),
        }
    }
}

impl From<&ReconnectSection> for RetryPolicy {
    fn from(section: &ReconnectSection) -> Self {
        Self {
            max_retries: section.max_retries,
            base_delay: section.base_delay(),
            cap_delay: section.cap_delay(),
        }
    }
}

/// Decision result for a reconnection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectionDecision {
    /// Sleep for `delay`, then make attempt number `attempt`
    Proceed { attempt: u32, delay: Duration },
    /// The episode has used up all of its attempts
    AbortMaxAttemptsExceeded,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, cap_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            cap_delay,
        }
    }

    /// Backoff delay before the given attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .map_or(self.cap_delay, |delay| delay.min(self.cap_delay))
    }

    /// Whether `attempt` may run, and how long to wait before it
    pub fn decide(&self, attempt: u32) -> ReconnectionDecision {
        if attempt == 0 || attempt > self.max_retries {
            return ReconnectionDecision::AbortMaxAttemptsExceeded;
        }

        ReconnectionDecision::Proceed {
            attempt,
            delay: self.delay(attempt),
        }
    }

    /// Total time spent sleeping by an episode that exhausts every attempt
    pub fn max_total_delay(&self) -> Duration {
        (1..=self.max_retries).map(|attempt| self.delay(attempt)).sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("max_retries must be greater than 0".to_string());
        }
        if self.base_delay.is_zero() {
            return Err("base_delay must be greater than 0".to_string());
        }
        if self.cap_delay < self.base_delay {
            return Err("cap_delay must not be below base_delay".to_string());
        }
        Ok(())
    }
}

/// Per-episode attempt counter
///
/// Created when a reconnection episode starts and dropped when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self { attempt: 1 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn record_failure(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}
