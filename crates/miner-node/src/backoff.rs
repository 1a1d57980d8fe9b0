//! Cooldown between failed node requests.

use std::time::{Duration, Instant};

/// Exponential backoff: each consecutive failure doubles the cooldown, up to
/// a cap. A success clears it.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    retry_at: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff {
            base,
            max: max.max(base),
            failures: 0,
            retry_at: None,
        }
    }

    /// Whether a request may be attempted at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    /// Record a failure at `now` and return the cooldown it starts.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let delay = self
            .base
            .checked_mul(1u32 << self.failures.min(16))
            .map_or(self.max, |delay| delay.min(self.max));
        self.failures = self.failures.saturating_add(1);
        self.retry_at = Some(now + delay);
        delay
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.retry_at = None;
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let now = Instant::now();

        let delays: Vec<_> = (0..5).map(|_| backoff.record_failure(now)).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 5, 5].map(Duration::from_secs).to_vec()
        );
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn test_ready_after_cooldown() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(30));
        let now = Instant::now();
        assert!(backoff.ready(now));

        backoff.record_failure(now);
        assert!(!backoff.ready(now + Duration::from_secs(1)));
        assert!(backoff.ready(now + Duration::from_secs(2)));

        backoff.record_success();
        assert!(backoff.ready(now));
        assert_eq!(backoff.failures(), 0);
    }
}
