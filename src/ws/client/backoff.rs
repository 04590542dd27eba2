use std::time::Duration;

use rand::Rng;

/// Reconnect tuning: exponential backoff with base 2, additive jitter of up to 10%
/// of the exponential delay, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// upper bound of any delay, applied after jitter
    pub max_backoff: Duration,
    /// reconnect attempts before the client moves to failed
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30000),
            max_attempts: 5,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ReconnectConfig {
    fn exponential_ms(&self, attempt: u32) -> u64 {
        millis(self.initial_backoff).saturating_mul(2u64.saturating_pow(attempt))
    }

    /// Delay without jitter: `initial * 2^attempt`, capped at `max_backoff`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.exponential_ms(attempt).min(millis(self.max_backoff)))
    }

    /// Delay for the given 0-based attempt, jitter drawn from `rng`
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponential = self.exponential_ms(attempt);
        let jitter = rng.gen_range(0..=exponential / 10);

        Duration::from_millis(
            exponential
                .saturating_add(jitter)
                .min(millis(self.max_backoff)),
        )
    }
}
