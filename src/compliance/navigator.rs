//! Compliant navigation: robots check, pacing, then navigate with bounded
//! retries.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use super::{Pacer, RobotsCache, RobotsDecision};
use crate::session::Session;

#[derive(Debug, Error)]
pub enum NavError {
    /// Permanent, non-retried skip for this URL.
    #[error("robots.txt disallows {0}")]
    RobotsDenied(String),

    #[error("navigation to {url} failed after {attempts} attempts: {message}")]
    Exhausted {
        url: String,
        attempts: u32,
        message: String,
    },
}

impl NavError {
    pub fn is_compliance_skip(&self) -> bool {
        matches!(self, Self::RobotsDenied(_))
    }
}

/// Drives every page load of a scrape run.
pub struct Navigator {
    robots: Arc<RobotsCache>,
    pacer: Pacer,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Navigator {
    pub fn new(
        robots: Arc<RobotsCache>,
        rate_limit: Duration,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            robots,
            pacer: Pacer::new(rate_limit),
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    /// Navigate with compliance: robots check first (a denial never reaches
    /// the session), pacing before each attempt, and a bounded retry loop
    /// with a fixed inter-attempt delay.
    pub async fn navigate(&self, session: &mut dyn Session, url: &str) -> Result<(), NavError> {
        if self.robots.check(url).await == RobotsDecision::Denied {
            return Err(NavError::RobotsDenied(url.to_string()));
        }

        let interval = self
            .robots
            .crawl_delay(url)
            .await
            .unwrap_or(Duration::ZERO);

        let mut attempt = 1u32;
        loop {
            self.pacer.acquire_at_least(interval).await;

            match session.navigate(url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Navigation attempt {}/{} for {} failed: {}", attempt, self.retry_attempts, url, e);
                    if attempt >= self.retry_attempts {
                        return Err(NavError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::RobotsPolicy;
    use crate::session::StaticSession;

    fn navigator(robots: Arc<RobotsCache>) -> Navigator {
        Navigator::new(robots, Duration::from_millis(1), 3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn denied_url_never_touches_the_session() {
        let robots = Arc::new(RobotsCache::new("harvester", true));
        robots
            .prime(
                "example.edu",
                RobotsPolicy::parse("User-agent: *\nDisallow: /private/\n"),
            )
            .await;

        let mut session = StaticSession::new()
            .with_page("https://example.edu/private/x", "<html></html>");

        let nav = navigator(robots);
        let err = nav
            .navigate(&mut session, "https://example.edu/private/x")
            .await
            .unwrap_err();

        assert!(err.is_compliance_skip());
        assert!(session.navigations().is_empty());
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let robots = Arc::new(RobotsCache::new("harvester", false));
        // No page registered: every navigation fails.
        let mut session = StaticSession::new();

        let nav = navigator(robots);
        let err = nav
            .navigate(&mut session, "https://example.edu/missing")
            .await
            .unwrap_err();

        match err {
            NavError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.navigations().len(), 3);
    }

    #[tokio::test]
    async fn success_needs_one_attempt() {
        let robots = Arc::new(RobotsCache::new("harvester", false));
        let mut session =
            StaticSession::new().with_page("https://example.edu/ok", "<html></html>");

        let nav = navigator(robots);
        nav.navigate(&mut session, "https://example.edu/ok")
            .await
            .unwrap();
        assert_eq!(session.navigations().len(), 1);
    }
}
