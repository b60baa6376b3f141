//! Exponential-backoff policy for re-establishing the push subscription.
//!
//! The bus run loop sleeps between subscription attempts using
//! [`next_delay`]; the delay resets to the initial value once a
//! connection is established.

use std::time::Duration;

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Compute the delay to use after the current one, clamped to
/// [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_by_multiplier() {
        let config = ReconnectConfig::default();
        assert_eq!(
            next_delay(Duration::from_secs(4), &config),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn delay_is_clamped() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(
            next_delay(Duration::from_secs(4), &config),
            Duration::from_secs(5)
        );
        assert_eq!(
            next_delay(Duration::from_secs(5), &config),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn default_sequence_saturates_at_thirty() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(delay.as_secs());
            delay = next_delay(delay, &config);
        }
        assert_eq!(seen, [1, 2, 4, 8, 16, 30, 30]);
    }
}
