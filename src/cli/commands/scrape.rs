//! Direct scrape: run one source now, ingest the results, print a summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;

use super::{build_normalizer, open_catalog, session_factory};
use crate::compliance::{Navigator, RobotsCache};
use crate::config::Settings;
use crate::ingest::IngestOutcome;
use crate::models::{JobConfig, SourceType};
use crate::scrapers::{ScrapeRunner, ScraperRegistry};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    settings: &Settings,
    source: SourceType,
    url: Option<String>,
    query: Option<String>,
    limit: Option<usize>,
    screenshot: Option<PathBuf>,
    no_browser: bool,
) -> anyhow::Result<()> {
    let registry = ScraperRegistry::builtin();
    let scraper = registry
        .create(source)
        .context("no scraper registered for source")?;

    let config = JobConfig {
        url,
        search_query: query,
        max_links: limit.or(settings.scrape.max_links),
    };
    let scrape = settings.scrape_for(source);

    let sessions = session_factory(settings, Some(source), no_browser);
    let robots = Arc::new(RobotsCache::new(
        settings.robots_user_agent(),
        settings.scrape.respect_robots_txt,
    ));

    if let Some(path) = screenshot {
        return capture_screenshot(&sessions, &robots, &scrape, &*scraper, &config, &path).await;
    }

    let navigator = Navigator::new(
        robots,
        Duration::from_millis(scrape.rate_limit_ms),
        scrape.retry_attempts,
        Duration::from_millis(scrape.retry_delay_ms),
    );

    let mut session = sessions
        .create()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start session: {e}"))?;

    println!("Scraping {}...", style(source.as_str()).cyan());
    let report = ScrapeRunner::new(navigator)
        .run(&*scraper, session.as_mut(), &config)
        .await?;

    let store = open_catalog(settings)?;
    let normalizer = build_normalizer(store, settings);

    let mut ingested = 0usize;
    let mut rejected = 0usize;
    for record in &report.records {
        match normalizer.ingest(record).await? {
            IngestOutcome::Ingested { .. } => ingested += 1,
            IngestOutcome::Rejected { reason } => {
                println!(
                    "  {} {} ({})",
                    style("rejected").yellow(),
                    record.source_url,
                    reason
                );
                rejected += 1;
            }
        }
    }

    println!(
        "{} {} pages visited, {} failed, {} skipped",
        style("Done:").green().bold(),
        report.pages_visited,
        report.pages_failed,
        report.pages_skipped
    );
    println!("  {ingested} courses ingested, {rejected} rejected");
    Ok(())
}

/// Capture the listing page for selector debugging.
async fn capture_screenshot(
    sessions: &Arc<dyn crate::session::SessionFactory>,
    robots: &Arc<RobotsCache>,
    scrape: &crate::config::ScrapeSettings,
    scraper: &dyn crate::scrapers::CourseScraper,
    config: &JobConfig,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    let entry = scraper.entrypoint(config)?;
    let navigator = Navigator::new(
        robots.clone(),
        Duration::from_millis(scrape.rate_limit_ms),
        scrape.retry_attempts,
        Duration::from_millis(scrape.retry_delay_ms),
    );

    let mut session = sessions
        .create()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start session: {e}"))?;

    let result = async {
        navigator
            .navigate(session.as_mut(), &entry)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let png = session
            .screenshot()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        std::fs::write(path, png).context("failed to write screenshot")?;
        Ok::<_, anyhow::Error>(())
    }
    .await;
    session.cleanup().await;
    result?;

    println!("Saved screenshot of {} to {}", entry, path.display());
    Ok(())
}
