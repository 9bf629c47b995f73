//! Timeout and cancellation control for a single request.
//!
//! One `Deadline` is created per inference request and shared across every
//! attempt. It couples the overall wall-clock budget with a cooperative
//! cancellation token so that client disconnects and deadline expiry both
//! abandon in-flight work deterministically.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The shared overall deadline for one request.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Create a deadline expiring `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            token: CancellationToken::new(),
        }
    }

    /// Cancel the request externally (e.g., the caller disconnected).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the overall budget is spent or the request was cancelled.
    pub fn expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// Time left before expiry, or `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        if self.token.is_cancelled() {
            return None;
        }
        let now = Instant::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }

    /// Clamp a per-call timeout to the remaining overall budget.
    ///
    /// Returns `None` when the deadline has already passed, so callers never
    /// start a call they cannot finish.
    pub fn clamp(&self, per_call: Duration) -> Option<Duration> {
        self.remaining().map(|left| per_call.min(left))
    }

    /// Sleep for `duration`, waking early if the deadline fires.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// deadline or an external cancellation interrupted the wait. Backoff
    /// waits go through here so a request never sleeps past its budget.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let wake_at = Instant::now() + duration;
        if wake_at >= self.expires_at {
            // The wait itself would outlive the budget; sleep out the
            // remainder and report expiry.
            tokio::select! {
                _ = self.token.cancelled() => {}
                _ = tokio::time::sleep_until(self.expires_at.into()) => {}
            }
            return false;
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep_until(wake_at.into()) => true,
        }
    }

    /// Resolves when the request is cancelled externally.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_deadline_not_expired() {
        let deadline = Deadline::new(Duration::from_secs(60));
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_some());
    }

    #[tokio::test]
    async fn test_clamp_uses_smaller_budget() {
        let deadline = Deadline::new(Duration::from_secs(10));
        let clamped = deadline.clamp(Duration::from_secs(60)).unwrap();
        assert!(clamped <= Duration::from_secs(10));

        let clamped = deadline.clamp(Duration::from_millis(100)).unwrap();
        assert_eq!(clamped, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_cancel_expires_immediately() {
        let deadline = Deadline::new(Duration::from_secs(60));
        deadline.cancel();
        assert!(deadline.expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.clamp(Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_sleep_completes_within_budget() {
        let deadline = Deadline::new(Duration::from_secs(10));
        assert!(deadline.sleep(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_expiry() {
        let deadline = Deadline::new(Duration::from_millis(30));
        let start = Instant::now();
        assert!(!deadline.sleep(Duration::from_secs(5)).await);
        // Woke at expiry, not after the full requested sleep
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(deadline.expired());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_cancel() {
        let deadline = Deadline::new(Duration::from_secs(60));
        let sleeper = deadline.clone();
        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        deadline.cancel();
        assert!(!handle.await.unwrap());
    }
}
