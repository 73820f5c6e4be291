//! Cron-driven sweep scheduling.
//!
//! The scheduler only enqueues jobs; the worker pool does the actual work.
//! Three sweeps: a daily university-catalog pass, a six-hourly platform pass
//! over the configured search queries, and a weekly comprehensive pass at
//! higher priority.

use std::sync::Arc;

use anyhow::Context;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::models::{JobConfig, SourceType};
use crate::queue::{EnqueueOpts, JobQueue};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Six-field cron (with seconds).
    pub daily_catalog_cron: String,
    pub platform_cron: String,
    pub weekly_cron: String,
    pub search_queries: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            daily_catalog_cron: "0 0 2 * * *".to_string(),
            platform_cron: "0 0 */6 * * *".to_string(),
            weekly_cron: "0 0 3 * * Sun".to_string(),
            search_queries: vec![
                "computer science".to_string(),
                "data science".to_string(),
                "business".to_string(),
            ],
        }
    }
}

/// Start the background scheduler. The returned handle keeps it alive.
pub async fn start(queue: Arc<JobQueue>, config: SweepConfig) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;

    {
        let queue = queue.clone();
        let job = Job::new_async(config.daily_catalog_cron.as_str(), move |_uuid, _lock| {
            let queue = queue.clone();
            Box::pin(async move {
                info!("Daily catalog sweep");
                enqueue_logged(&queue, SourceType::OpenUniversity, JobConfig::default(), 0);
            })
        })
        .context("invalid daily catalog cron expression")?;
        scheduler.add(job).await?;
    }

    {
        let queue = queue.clone();
        let queries = config.search_queries.clone();
        let job = Job::new_async(config.platform_cron.as_str(), move |_uuid, _lock| {
            let queue = queue.clone();
            let queries = queries.clone();
            Box::pin(async move {
                info!(queries = queries.len(), "Platform sweep");
                for query in &queries {
                    let config = JobConfig {
                        search_query: Some(query.clone()),
                        ..Default::default()
                    };
                    enqueue_logged(&queue, SourceType::Coursera, config.clone(), 0);
                    enqueue_logged(&queue, SourceType::FutureLearn, config, 0);
                }
            })
        })
        .context("invalid platform cron expression")?;
        scheduler.add(job).await?;
    }

    {
        let queue = queue.clone();
        let queries = config.search_queries.clone();
        let job = Job::new_async(config.weekly_cron.as_str(), move |_uuid, _lock| {
            let queue = queue.clone();
            let queries = queries.clone();
            Box::pin(async move {
                info!("Weekly comprehensive sweep");
                enqueue_logged(&queue, SourceType::OpenUniversity, JobConfig::default(), 5);
                for query in &queries {
                    let config = JobConfig {
                        search_query: Some(query.clone()),
                        max_links: Some(30),
                        ..Default::default()
                    };
                    enqueue_logged(&queue, SourceType::Coursera, config.clone(), 5);
                    enqueue_logged(&queue, SourceType::FutureLearn, config, 5);
                }
            })
        })
        .context("invalid weekly cron expression")?;
        scheduler.add(job).await?;
    }

    scheduler.start().await.context("failed to start scheduler")?;
    info!("Scheduler started");
    Ok(scheduler)
}

fn enqueue_logged(queue: &JobQueue, source: SourceType, config: JobConfig, priority: i32) {
    let opts = EnqueueOpts {
        priority,
        ..Default::default()
    };
    if let Err(e) = queue.enqueue(source, config, opts) {
        error!(%source, error = %e, "Failed to enqueue scheduled job");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_cron_expressions_are_valid() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            JobQueue::open(dir.path().join("queue.db"), 3, chrono::Duration::zero()).unwrap(),
        );
        let mut scheduler = start(queue, SweepConfig::default()).await.unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
