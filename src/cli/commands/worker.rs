//! Worker pool command: drain the queue or poll forever, optionally with the
//! cron scheduler running alongside.

use std::sync::Arc;

use console::style;

use super::{build_normalizer, open_catalog, open_queue, session_factory};
use crate::compliance::RobotsCache;
use crate::config::Settings;
use crate::scrapers::ScraperRegistry;
use crate::queue::{WorkerContext, WorkerPool};

pub async fn run(
    settings: &Settings,
    concurrency: Option<usize>,
    with_scheduler: bool,
    drain: bool,
    no_browser: bool,
) -> anyhow::Result<()> {
    let queue = Arc::new(open_queue(settings)?);
    let store = open_catalog(settings)?;

    let mut config = settings.worker_config();
    if let Some(n) = concurrency {
        config.concurrency = n.max(1);
    }

    let ctx = WorkerContext {
        queue: queue.clone(),
        registry: Arc::new(ScraperRegistry::builtin()),
        sessions: session_factory(settings, None, no_browser),
        normalizer: Arc::new(build_normalizer(store, settings)),
        robots: Arc::new(RobotsCache::new(
            settings.robots_user_agent(),
            settings.scrape.respect_robots_txt,
        )),
    };
    let pool = WorkerPool::new(ctx, config.clone());

    let _scheduler = if with_scheduler {
        Some(crate::scheduler::start(queue.clone(), settings.scheduler.sweeps.clone()).await?)
    } else {
        None
    };

    if drain {
        println!(
            "Draining queue with {} worker(s)...",
            style(config.concurrency).cyan()
        );
        pool.run_until_idle().await;
        println!("{}", style("Queue drained.").green());
    } else {
        println!(
            "Running {} worker(s){}. Ctrl-C to stop.",
            style(config.concurrency).cyan(),
            if with_scheduler { " with scheduler" } else { "" }
        );
        tokio::select! {
            _ = pool.run_forever() => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down.");
            }
        }
    }
    Ok(())
}
