//! Minimum-interval pacing between requests on one session.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between request issue times.
///
/// The interval is measured from when the previous request was issued, not
/// when it completed, so slow pages do not earn extra politeness credit.
pub struct Pacer {
    min_interval: Duration,
    last_issue: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_issue: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until the configured interval has elapsed since the previous
    /// request's issue time, then mark a new request as issued.
    pub async fn acquire(&self) {
        self.acquire_at_least(self.min_interval).await;
    }

    /// Like `acquire`, but honoring a larger interval (e.g. a robots
    /// crawl-delay that exceeds our own configuration).
    pub async fn acquire_at_least(&self, interval: Duration) {
        let interval = interval.max(self.min_interval);
        let mut last = self.last_issue.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + interval;
            let now = Instant::now();
            if ready_at > now {
                trace!("Pacing: sleeping {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced() {
        let pacer = Pacer::new(Duration::from_millis(1000));

        let start = Instant::now();
        pacer.acquire().await;
        let first = Instant::now() - start;
        pacer.acquire().await;
        let second = Instant::now() - start;

        // First request goes out immediately; the second waits the interval.
        assert!(first < Duration::from_millis(10));
        assert!(second >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn crawl_delay_extends_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(500));

        let start = Instant::now();
        pacer.acquire_at_least(Duration::from_millis(2000)).await;
        pacer.acquire_at_least(Duration::from_millis(2000)).await;
        let elapsed = Instant::now() - start;

        assert!(elapsed >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_measured_from_issue_time() {
        let pacer = Pacer::new(Duration::from_millis(1000));

        pacer.acquire().await;
        // Simulate a slow page taking longer than the interval.
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let start = Instant::now();
        pacer.acquire().await;
        // Interval already elapsed during the slow page; no extra wait.
        assert!(Instant::now() - start < Duration::from_millis(10));
    }
}
