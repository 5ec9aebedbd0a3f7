//! Exponential backoff for reconnect attempts.
//!
//! A backoff round starts at the initial interval and grows by a constant
//! multiplier up to a ceiling; the round gives up once its total elapsed
//! time exceeds a bound. The sender never stops retrying: when a round
//! gives up it simply starts a fresh one.

use std::time::{Duration, Instant};

/// Parameters of one backoff round.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Growth factor applied after every retry.
    pub multiplier: f64,
    /// Ceiling on a single delay.
    pub max_interval: Duration,
    /// Total time the round may spend before giving up.
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(15 * 60),
        }
    }
}

/// One backoff round in progress.
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
    started: Instant,
}

impl Backoff {
    /// Start a round now.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self::starting_at(policy, Instant::now())
    }

    /// Start a round at an explicit time.
    pub fn starting_at(policy: BackoffPolicy, now: Instant) -> Self {
        Self {
            policy,
            next: policy.initial_interval,
            started: now,
        }
    }

    /// Get the next delay, or `None` if the round has used up its time.
    pub fn next_interval(&mut self) -> Option<Duration> {
        self.next_interval_at(Instant::now())
    }

    /// Get the next delay at an explicit time.
    pub fn next_interval_at(&mut self, now: Instant) -> Option<Duration> {
        if now.duration_since(self.started) > self.policy.max_elapsed {
            return None;
        }

        let interval = self.next;
        self.next = self
            .next
            .mul_f64(self.policy.multiplier)
            .min(self.policy.max_interval);
        Some(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_grow_by_multiplier() {
        let mut backoff = Backoff::new(BackoffPolicy::default());

        assert_eq!(backoff.next_interval(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_interval(), Some(Duration::from_millis(750)));
        assert_eq!(backoff.next_interval(), Some(Duration::from_millis(1125)));
    }

    #[test]
    fn test_interval_is_capped() {
        let policy = BackoffPolicy {
            initial_interval: Duration::from_secs(50),
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(600),
        };
        let mut backoff = Backoff::new(policy);

        assert_eq!(backoff.next_interval(), Some(Duration::from_secs(50)));
        assert_eq!(backoff.next_interval(), Some(Duration::from_secs(60)));
        assert_eq!(backoff.next_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_round_gives_up_after_max_elapsed() {
        let policy = BackoffPolicy::default();
        let start = Instant::now();
        let mut backoff = Backoff::starting_at(policy, start);

        let within = start + policy.max_elapsed - Duration::from_secs(1);
        assert!(backoff.next_interval_at(within).is_some());

        let past = start + policy.max_elapsed + Duration::from_secs(1);
        assert_eq!(backoff.next_interval_at(past), None);
    }
}
