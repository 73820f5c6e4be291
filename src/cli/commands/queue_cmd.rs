//! Queue management commands.

use chrono::Duration;
use console::style;

use super::open_queue;
use crate::config::Settings;
use crate::models::{JobConfig, JobState, SourceType};
use crate::queue::EnqueueOpts;

pub fn enqueue(
    settings: &Settings,
    source: SourceType,
    url: Option<String>,
    query: Option<String>,
    limit: Option<usize>,
    priority: i32,
    delay_secs: u64,
) -> anyhow::Result<()> {
    let queue = open_queue(settings)?;
    let config = JobConfig {
        url,
        search_query: query,
        max_links: limit.or(settings.scrape.max_links),
    };
    let job = queue.enqueue(
        source,
        config,
        EnqueueOpts {
            priority,
            delay: Duration::seconds(delay_secs as i64),
        },
    )?;
    println!(
        "Enqueued {} job {} (priority {}, runs at {})",
        style(source.as_str()).cyan(),
        job.id,
        job.priority,
        job.run_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

pub fn stats(settings: &Settings) -> anyhow::Result<()> {
    let queue = open_queue(settings)?;
    let stats = queue.stats()?;
    if queue.is_paused()? {
        println!("{}", style("Queue is PAUSED").yellow().bold());
    }
    println!("waiting:   {}", stats.waiting);
    println!("  delayed: {}", stats.delayed);
    println!("active:    {}", stats.active);
    println!("completed: {}", stats.completed);
    println!("failed:    {}", stats.failed);
    Ok(())
}

pub fn list(settings: &Settings, state: Option<String>, limit: usize) -> anyhow::Result<()> {
    let state = match state.as_deref() {
        Some(s) => Some(
            JobState::parse(s)
                .ok_or_else(|| anyhow::anyhow!("unknown state '{s}'; expected waiting, active, completed or failed"))?,
        ),
        None => None,
    };

    let queue = open_queue(settings)?;
    let jobs = queue.list(state, limit)?;
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    for job in jobs {
        let state = match job.state {
            JobState::Completed => style(job.state.as_str()).green(),
            JobState::Failed => style(job.state.as_str()).red(),
            JobState::Active => style(job.state.as_str()).cyan(),
            JobState::Waiting => style(job.state.as_str()).dim(),
        };
        println!(
            "{}  {:<15} {:<9} attempts {}/{}  {}",
            job.id,
            job.source_type.as_str(),
            state,
            job.attempts,
            job.max_attempts,
            job.last_error.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn pause(settings: &Settings) -> anyhow::Result<()> {
    open_queue(settings)?.pause()?;
    println!("Queue paused. Active jobs will finish; nothing new dispatches.");
    Ok(())
}

pub fn resume(settings: &Settings) -> anyhow::Result<()> {
    open_queue(settings)?.resume()?;
    println!("Queue resumed.");
    Ok(())
}

pub fn retry_failed(settings: &Settings) -> anyhow::Result<()> {
    let retried = open_queue(settings)?.retry_failed()?;
    println!("Requeued {retried} failed job(s).");
    Ok(())
}

pub fn clean(settings: &Settings) -> anyhow::Result<()> {
    let queue = open_queue(settings)?;
    let removed = queue.clean(
        Duration::hours(settings.queue.completed_retention_hours as i64),
        Duration::hours(settings.queue.failed_retention_hours as i64),
    )?;
    println!("Removed {removed} old finished job(s).");
    Ok(())
}

pub fn remove(settings: &Settings, id: &str) -> anyhow::Result<()> {
    if open_queue(settings)?.remove(id)? {
        println!("Removed job {id}.");
    } else {
        println!("No job with id {id}.");
    }
    Ok(())
}
