//! Durable job queue.
//!
//! Jobs survive restarts in SQLite. The facade wraps the row store with
//! enqueue options and operator controls; the worker pool drains it.

mod store;
mod worker;

pub use store::JobStore;
pub use worker::{SourcePacing, WorkerConfig, WorkerContext, WorkerPool};

use std::path::Path;

use chrono::Duration;
use tracing::info;

use crate::models::{JobConfig, JobState, QueueStats, ScrapeJob, SourceType};
use crate::repository::Result;

/// Options applied at enqueue time.
#[derive(Debug, Clone)]
pub struct EnqueueOpts {
    /// Higher runs first.
    pub priority: i32,
    /// Earliest dispatch delay from now.
    pub delay: Duration,
}

impl Default for EnqueueOpts {
    fn default() -> Self {
        Self {
            priority: 0,
            delay: Duration::zero(),
        }
    }
}

pub struct JobQueue {
    store: JobStore,
    max_attempts: u32,
}

impl JobQueue {
    pub fn open(db_path: impl AsRef<Path>, max_attempts: u32, backoff_base: Duration) -> Result<Self> {
        Ok(Self {
            store: JobStore::new(db_path, backoff_base)?,
            max_attempts,
        })
    }

    pub fn enqueue(
        &self,
        source_type: SourceType,
        config: JobConfig,
        opts: EnqueueOpts,
    ) -> Result<ScrapeJob> {
        let job = ScrapeJob::new(source_type, config, opts.priority, opts.delay, self.max_attempts);
        self.store.insert(&job)?;
        info!(
            job_id = %job.id,
            source = %job.source_type,
            priority = job.priority,
            run_at = %job.run_at,
            "Enqueued job"
        );
        Ok(job)
    }

    /// Claim the next eligible job unless the queue is paused.
    pub fn claim_next(&self) -> Result<Option<ScrapeJob>> {
        if self.store.is_paused()? {
            return Ok(None);
        }
        self.store.claim_next()
    }

    pub fn pause(&self) -> Result<()> {
        info!("Queue paused");
        self.store.set_paused(true)
    }

    pub fn resume(&self) -> Result<()> {
        info!("Queue resumed");
        self.store.set_paused(false)
    }

    pub fn is_paused(&self) -> Result<bool> {
        self.store.is_paused()
    }

    pub fn stats(&self) -> Result<QueueStats> {
        self.store.stats()
    }

    pub fn list(&self, state: Option<JobState>, limit: usize) -> Result<Vec<ScrapeJob>> {
        self.store.list(state, limit)
    }

    pub fn get(&self, id: &str) -> Result<Option<ScrapeJob>> {
        self.store.get(id)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        self.store.remove(id)
    }

    pub fn retry_failed(&self) -> Result<u64> {
        self.store.retry_failed()
    }

    pub fn clean(&self, completed_older_than: Duration, failed_older_than: Duration) -> Result<u64> {
        self.store.clean(completed_older_than, failed_older_than)
    }

    pub fn recover_stalled(&self, stall_timeout: Duration) -> Result<u64> {
        self.store.recover_stalled(stall_timeout)
    }

    pub(crate) fn store(&self) -> &JobStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (tempfile::TempDir, JobQueue) {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::open(dir.path().join("queue.db"), 3, Duration::zero()).unwrap();
        (dir, queue)
    }

    #[test]
    fn paused_queue_dispatches_nothing() {
        let (_dir, queue) = queue();
        queue
            .enqueue(SourceType::Coursera, JobConfig::default(), EnqueueOpts::default())
            .unwrap();

        queue.pause().unwrap();
        assert!(queue.claim_next().unwrap().is_none());

        queue.resume().unwrap();
        assert!(queue.claim_next().unwrap().is_some());
    }

    #[test]
    fn enqueue_with_delay_defers_eligibility() {
        let (_dir, queue) = queue();
        let job = queue
            .enqueue(
                SourceType::FutureLearn,
                JobConfig::default(),
                EnqueueOpts {
                    priority: 2,
                    delay: Duration::minutes(10),
                },
            )
            .unwrap();
        assert!(job.run_at > chrono::Utc::now());
        assert!(queue.claim_next().unwrap().is_none());
        let stats = queue.stats().unwrap();
        assert_eq!(stats.delayed, 1);
        assert_eq!(stats.waiting, 0);
    }
}
