//! Reconnection delay policy.

use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff: `min(base * 2^attempt, max)`, saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max)
    }
}

/// Retry bookkeeping owned by the connection manager.
#[derive(Debug, Default)]
pub struct RetryState {
    attempt_count: u32,
    pending_retry: Option<Instant>,
}

impl RetryState {
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn pending(&self) -> Option<Instant> {
        self.pending_retry
    }

    /// Arm a retry unless one is already pending. Returns the delay when armed.
    pub fn schedule(&mut self, backoff: &Backoff, now: Instant) -> Option<Duration> {
        if self.pending_retry.is_some() {
            return None;
        }
        let delay = backoff.delay(self.attempt_count);
        self.pending_retry = Some(now + delay);
        Some(delay)
    }

    /// The pending timer fired: count the attempt and clear the timer.
    pub fn begin_attempt(&mut self) -> u32 {
        self.pending_retry = None;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_then_saturate() {
        let b = Backoff::default();
        let secs: Vec<u64> = (0..10).map(|n| b.delay(n).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 60, 60, 60, 60]);
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let b = Backoff::default();
        assert_eq!(b.delay(31), Duration::from_secs(60));
        assert_eq!(b.delay(32), Duration::from_secs(60));
        assert_eq!(b.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn scheduling_is_idempotent() {
        let mut r = RetryState::default();
        let now = Instant::now();
        assert_eq!(r.schedule(&Backoff::default(), now), Some(Duration::from_secs(1)));
        assert_eq!(r.schedule(&Backoff::default(), now), None);
        assert_eq!(r.pending(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn attempts_grow_until_reset() {
        let mut r = RetryState::default();
        let now = Instant::now();
        r.schedule(&Backoff::default(), now);
        assert_eq!(r.begin_attempt(), 1);
        assert!(r.pending().is_none());
        assert_eq!(r.schedule(&Backoff::default(), now), Some(Duration::from_secs(2)));
        r.reset();
        assert_eq!(r.attempt_count(), 0);
        assert!(r.pending().is_none());
    }
}
