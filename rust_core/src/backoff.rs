//! Reconnect backoff for long-lived streams.
//!
//! Delay starts at a floor, grows by a fixed factor after every failed
//! cycle and is capped at a ceiling. One instance per source; a successful
//! connection resets it to the floor.

use std::time::Duration;

/// Backoff parameters
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// First delay after a failure (default: 5s)
    pub floor: Duration,
    /// Largest delay ever returned (default: 60s)
    pub ceiling: Duration,
    /// Growth per failed cycle (default: 1.5)
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(5),
            ceiling: Duration::from_secs(60),
            factor: 1.5,
        }
    }
}

/// Per-source backoff state
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.floor.min(config.ceiling);
        Self { config, current }
    }

    /// Delay to sleep now; advances the state for the next failure
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.as_secs_f64() * self.config.factor.max(1.0);
        self.current = Duration::from_secs_f64(grown.min(self.config.ceiling.as_secs_f64()));
        delay
    }

    /// Delay the next failure would sleep, without advancing
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Back to the floor after a successful connection
    pub fn reset(&mut self) {
        self.current = self.config.floor.min(self.config.ceiling);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_secs(actual: Duration, expected: f64) {
        assert!(
            (actual.as_secs_f64() - expected).abs() < 1e-6,
            "expected {}s, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_growth_sequence_capped_at_ceiling() {
        let mut backoff = Backoff::default();

        let expected = [
            5.0, 7.5, 11.25, 16.875, 25.3125, 37.96875, 56.953125, 60.0, 60.0,
        ];
        for secs in expected {
            assert_secs(backoff.next_delay(), secs);
        }
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut backoff = Backoff::default();
        for _ in 0..5 {
            backoff.next_delay();
        }
        assert!(backoff.peek() > Duration::from_secs(5));

        backoff.reset();
        assert_secs(backoff.peek(), 5.0);
        assert_secs(backoff.next_delay(), 5.0);
        assert_secs(backoff.next_delay(), 7.5);
    }

    #[test]
    fn test_floor_above_ceiling_is_clamped() {
        let mut backoff = Backoff::new(BackoffConfig {
            floor: Duration::from_secs(90),
            ceiling: Duration::from_secs(60),
            factor: 1.5,
        });
        assert_secs(backoff.next_delay(), 60.0);
        assert_secs(backoff.next_delay(), 60.0);
    }
}
