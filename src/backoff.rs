//! Capped exponential backoff shared by snapshot retries and reconnects

use std::time::Duration;

/// Exponent cap so the multiplier never overflows
const MAX_EXPONENT: u32 = 16;

/// Exponential backoff: `min(max_delay, base * 2^attempt)`
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_delay: Duration) -> Self {
        Self {
            base,
            max_delay,
            attempt: 0,
        }
    }

    /// Calculate the next delay and increment the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.pow(self.attempt.min(MAX_EXPONENT));
        let delay = self.base.saturating_mul(factor).min(self.max_delay);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset after a success
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delays handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
