//! Drives one scraper through one session under the compliance layer.

use tracing::{debug, info, warn};

use super::{dedupe_preserving_order, CourseScraper, ScrapeError};
use crate::compliance::{NavError, Navigator};
use crate::models::{JobConfig, RawCourseRecord};
use crate::session::Session;

/// Outcome of one scrape run.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub records: Vec<RawCourseRecord>,
    pub pages_visited: u32,
    pub pages_failed: u32,
    /// Detail pages skipped for compliance reasons (robots denial).
    pub pages_skipped: u32,
}

pub struct ScrapeRunner {
    navigator: Navigator,
}

impl ScrapeRunner {
    pub fn new(navigator: Navigator) -> Self {
        Self { navigator }
    }

    /// Run one job. The session is cleaned up on every exit path.
    pub async fn run(
        &self,
        scraper: &dyn CourseScraper,
        session: &mut dyn Session,
        config: &JobConfig,
    ) -> Result<ScrapeReport, ScrapeError> {
        let result = self.run_inner(scraper, session, config).await;
        session.cleanup().await;
        result
    }

    async fn run_inner(
        &self,
        scraper: &dyn CourseScraper,
        session: &mut dyn Session,
        config: &JobConfig,
    ) -> Result<ScrapeReport, ScrapeError> {
        let entry = scraper.entrypoint(config)?;
        info!(source = %scraper.source_type(), %entry, "Starting scrape run");

        // An unreachable or denied entrypoint fails the whole job; there is
        // nothing to partially salvage.
        if let Err(e) = self.navigator.navigate(session, &entry).await {
            return Err(match e {
                NavError::RobotsDenied(url) => ScrapeError::EntryDenied(url),
                other => ScrapeError::EntryFailed(other.to_string()),
            });
        }

        let mut report = ScrapeReport::default();
        report.pages_visited += 1;

        let links = dedupe_preserving_order(scraper.discover_links(session).await);
        let limit = config.max_links.unwrap_or_else(|| scraper.default_max_links());
        let total = links.len();
        let links: Vec<_> = links.into_iter().take(limit).collect();
        debug!(discovered = total, processing = links.len(), "Discovered detail links");

        for url in &links {
            match self.navigator.navigate(session, url).await {
                Ok(()) => {}
                Err(e) if e.is_compliance_skip() => {
                    debug!(%url, "Skipping disallowed detail page");
                    report.pages_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%url, error = %e, "Detail page unreachable");
                    report.pages_failed += 1;
                    continue;
                }
            }
            report.pages_visited += 1;

            match scraper.extract_details(&*session, url).await {
                Some(record) => report.records.push(record),
                None => {
                    warn!(%url, "Detail page yielded no usable record");
                    report.pages_failed += 1;
                }
            }
        }

        info!(
            source = %scraper.source_type(),
            records = report.records.len(),
            visited = report.pages_visited,
            failed = report.pages_failed,
            skipped = report.pages_skipped,
            "Scrape run finished"
        );
        Ok(report)
    }
}
