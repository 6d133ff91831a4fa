//! Retry schedule driving reconnection backoff.
//!
//! Delays grow exponentially from a base value, are capped at a maximum,
//! and carry a bounded random jitter so simultaneously disconnected clients
//! do not reconnect in lockstep. The deterministic core is exposed
//! separately from the jittered draw for testing.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff schedule with a cap and bounded jitter.
///
/// The schedule owns the attempt counter: [`next_delay`](Self::next_delay)
/// derives the delay for the current attempt and advances the counter, and
/// [`reset`](Self::reset) rewinds to the base delay after a successful
/// connection.
#[derive(Clone, Debug)]
pub struct RetrySchedule {
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter: Duration,
}

impl RetrySchedule {
    /// Create a schedule growing from `base` towards `max`, with up to
    /// `jitter` of extra random delay per attempt.
    #[must_use]
    pub const fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self {
            attempt: 0,
            base,
            max,
            jitter,
        }
    }

    /// Number of failed attempts since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 { self.attempt }

    /// Deterministic delay for `attempt`: `base * 2^attempt`, capped at the
    /// configured maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let Some(factor) = 1u32.checked_shl(attempt) else {
            return self.max;
        };
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Delay to wait before the next connection attempt, advancing the
    /// attempt counter.
    ///
    /// Returns the deterministic delay for the current attempt plus a
    /// uniform random jitter in `[0, jitter]`.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay + self.draw_jitter()
    }

    /// Rewind to attempt zero after a successful connection.
    pub fn reset(&mut self) { self.attempt = 0; }

    /// Whether the configured attempt cap has been reached.
    ///
    /// A cap of zero means retry forever.
    #[must_use]
    pub const fn is_exhausted(&self, max_retries: u32) -> bool {
        max_retries != 0 && self.attempt >= max_retries
    }

    fn draw_jitter(&self) -> Duration {
        let bound = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
    }
}
