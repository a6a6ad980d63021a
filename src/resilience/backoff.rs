//! Exponential reconnect backoff.

use std::time::Duration;

/// Doubling backoff bounded by `[min, max]`.
///
/// `current` is the delay the next failure will wait; each failure hands it
/// out and doubles it for the one after. A success resets to `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    current: Duration,
    min: Duration,
    max: Duration,
}

impl BackoffState {
    /// Create a backoff starting at `min`. A `max` below `min` is raised to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            current: min,
            min,
            max,
        }
    }

    /// Delay to wait after a failure; doubles the following one (capped at `max`).
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Reset to `min` and return the delay to wait after a success.
    pub fn on_success(&mut self) -> Duration {
        self.current = self.min;
        self.current
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_backoff_doubles_then_resets() {
        let mut backoff = BackoffState::new(secs(1), secs(60));
        assert_eq!(backoff.on_failure(), secs(1));
        assert_eq!(backoff.on_failure(), secs(2));
        assert_eq!(backoff.on_failure(), secs(4));
        assert_eq!(backoff.current(), secs(8));

        assert_eq!(backoff.on_success(), secs(1));
        assert_eq!(backoff.current(), secs(1));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let mut backoff = BackoffState::new(secs(1), secs(5));
        let delays: Vec<_> = (0..6).map(|_| backoff.on_failure()).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(5), secs(5), secs(5)]);
        assert!(backoff.current() <= backoff.max());
    }

    #[test]
    fn test_backoff_bounds_hold() {
        let mut backoff = BackoffState::new(secs(3), secs(1));
        assert_eq!(backoff.max(), secs(3));
        for _ in 0..10 {
            backoff.on_failure();
            assert!(backoff.min() <= backoff.current() && backoff.current() <= backoff.max());
        }
    }
}
