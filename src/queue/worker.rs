//! Worker pool that drains the job queue.
//!
//! Each worker claims one job at a time, runs the scrape with a fresh
//! session, feeds the results through the normalizer, and settles the job.
//! A heartbeat task keeps the claim visibly alive so the stalled reaper
//! leaves it alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::JobQueue;
use crate::compliance::{Navigator, RobotsCache};
use crate::ingest::{IngestOutcome, Normalizer};
use crate::models::{ScrapeJob, SourceType};
use crate::scrapers::{ScrapeError, ScrapeRunner, ScraperRegistry};
use crate::session::SessionFactory;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    /// Minimum spacing between request issues within one job.
    pub rate_limit: Duration,
    /// Per-page navigation retries inside a job.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Idle sleep between claim polls.
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Active jobs without a heartbeat for this long get requeued.
    pub stall_timeout: chrono::Duration,
    /// Per-source pacing overrides; sources without an entry use the
    /// pool-wide values above.
    pub sources: HashMap<SourceType, SourcePacing>,
}

/// Pacing overrides for one source. Unset fields inherit `WorkerConfig`.
#[derive(Debug, Clone, Default)]
pub struct SourcePacing {
    pub rate_limit: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            rate_limit: Duration::from_millis(1500),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(15),
            stall_timeout: chrono::Duration::minutes(5),
            sources: HashMap::new(),
        }
    }
}

impl WorkerConfig {
    /// Effective (rate limit, retry attempts, retry delay) for one source.
    pub fn pacing_for(&self, source: SourceType) -> (Duration, u32, Duration) {
        let overrides = self.sources.get(&source);
        (
            overrides
                .and_then(|o| o.rate_limit)
                .unwrap_or(self.rate_limit),
            overrides
                .and_then(|o| o.retry_attempts)
                .unwrap_or(self.retry_attempts),
            overrides
                .and_then(|o| o.retry_delay)
                .unwrap_or(self.retry_delay),
        )
    }
}

/// Shared dependencies of every worker.
pub struct WorkerContext {
    pub queue: Arc<JobQueue>,
    pub registry: Arc<ScraperRegistry>,
    pub sessions: Arc<dyn SessionFactory>,
    pub normalizer: Arc<Normalizer>,
    pub robots: Arc<RobotsCache>,
}

pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(ctx: WorkerContext, config: WorkerConfig) -> Self {
        Self {
            ctx: Arc::new(ctx),
            config,
        }
    }

    /// Drain the queue and return once no work is left.
    pub async fn run_until_idle(&self) {
        self.recover_stalled();

        let mut handles = Vec::new();
        for worker_id in 0..self.config.concurrency.max(1) {
            let ctx = self.ctx.clone();
            let config = self.config.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    match ctx.queue.claim_next() {
                        Ok(Some(job)) => process_one(&ctx, &config, job).await,
                        Ok(None) => {
                            // Another worker may still requeue its job.
                            let active = ctx.queue.stats().map(|s| s.active).unwrap_or(0);
                            if active == 0 {
                                break;
                            }
                            tokio::time::sleep(config.poll_interval).await;
                        }
                        Err(e) => {
                            error!(worker_id, error = %e, "Claim failed");
                            tokio::time::sleep(config.poll_interval).await;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Poll forever; jobs may arrive at any time.
    pub async fn run_forever(&self) {
        self.recover_stalled();
        info!(concurrency = self.config.concurrency, "Worker pool running");

        let mut handles = Vec::new();
        for worker_id in 0..self.config.concurrency.max(1) {
            let ctx = self.ctx.clone();
            let config = self.config.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    match ctx.queue.claim_next() {
                        Ok(Some(job)) => process_one(&ctx, &config, job).await,
                        Ok(None) => tokio::time::sleep(config.poll_interval).await,
                        Err(e) => {
                            error!(worker_id, error = %e, "Claim failed");
                            tokio::time::sleep(config.poll_interval).await;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn recover_stalled(&self) {
        if let Err(e) = self.ctx.queue.recover_stalled(self.config.stall_timeout) {
            error!(error = %e, "Stalled job recovery failed");
        }
    }
}

async fn process_one(ctx: &WorkerContext, config: &WorkerConfig, job: ScrapeJob) {
    info!(
        job_id = %job.id,
        source = %job.source_type,
        attempt = job.attempts,
        "Processing job"
    );

    let Some(scraper) = ctx.registry.create(job.source_type) else {
        settle_err(ctx, &job, true, "no scraper registered for source type");
        return;
    };

    let mut session = match ctx.sessions.create().await {
        Ok(session) => session,
        Err(e) => {
            settle_err(ctx, &job, false, &format!("session start failed: {e}"));
            return;
        }
    };

    let heartbeat = spawn_heartbeat(ctx.queue.clone(), job.id.clone(), config.heartbeat_interval);

    let (rate_limit, retry_attempts, retry_delay) = config.pacing_for(job.source_type);
    let navigator = Navigator::new(ctx.robots.clone(), rate_limit, retry_attempts, retry_delay);
    let result = ScrapeRunner::new(navigator)
        .run(scraper.as_ref(), session.as_mut(), &job.config)
        .await;

    heartbeat.abort();

    match result {
        Ok(report) => {
            let mut ingested = 0usize;
            let mut rejected = 0usize;
            for record in &report.records {
                match ctx.normalizer.ingest(record).await {
                    Ok(IngestOutcome::Ingested { .. }) => ingested += 1,
                    Ok(IngestOutcome::Rejected { reason }) => {
                        warn!(
                            job_id = %job.id,
                            source_url = %record.source_url,
                            %reason,
                            "Record rejected"
                        );
                        rejected += 1;
                    }
                    Err(e) => {
                        // Storage failure loses the whole job attempt.
                        settle_err(ctx, &job, false, &format!("ingest failed: {e}"));
                        return;
                    }
                }
            }
            info!(job_id = %job.id, ingested, rejected, "Job completed");
            if let Err(e) = ctx.queue.store().complete(&job.id) {
                error!(job_id = %job.id, error = %e, "Failed to mark job completed");
            }
        }
        Err(e) => {
            let permanent = matches!(
                e,
                ScrapeError::EntryDenied(_) | ScrapeError::InvalidConfig(_)
            );
            settle_err(ctx, &job, permanent, &e.to_string());
        }
    }
}

fn settle_err(ctx: &WorkerContext, job: &ScrapeJob, permanent: bool, error: &str) {
    let result = if permanent {
        ctx.queue.store().fail_permanent(&job.id, error)
    } else {
        ctx.queue.store().fail(job, error)
    };
    if let Err(e) = result {
        error!(job_id = %job.id, error = %e, "Failed to settle job");
    }
}

fn spawn_heartbeat(
    queue: Arc<JobQueue>,
    job_id: String,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = queue.store().heartbeat(&job_id) {
                warn!(%job_id, error = %e, "Heartbeat failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::ingest::{NormalizerConfig, StaticRates};
    use crate::repository::CatalogStore;
    use crate::models::{JobConfig, JobState, RawCourseRecord, SourceType};
    use crate::queue::EnqueueOpts;
    use crate::repository::MemoryCatalogStore;
    use crate::scrapers::CourseScraper;
    use crate::session::{Session, SessionError, StaticSession};

    const LIST_URL: &str = "https://example.edu/list";
    const DETAIL_URL: &str = "https://example.edu/c/1";

    struct StubScraper;

    #[async_trait]
    impl CourseScraper for StubScraper {
        fn source_type(&self) -> SourceType {
            SourceType::Coursera
        }

        fn entrypoint(&self, _config: &JobConfig) -> Result<String, ScrapeError> {
            Ok(LIST_URL.to_string())
        }

        fn default_max_links(&self) -> usize {
            10
        }

        async fn discover_links(&self, session: &mut dyn Session) -> Vec<String> {
            session.extract_each_attribute("a.course", "href").await
        }

        async fn extract_details(
            &self,
            session: &dyn Session,
            url: &str,
        ) -> Option<RawCourseRecord> {
            let mut record = RawCourseRecord::new(url);
            record.title = session.extract_text("h1").await?;
            record.university = "Test University".to_string();
            record.description = "A description easily long enough to pass.".to_string();
            Some(record)
        }
    }

    /// Yields broken sessions for the first `failures` creations.
    struct FlakyFactory {
        created: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl crate::session::SessionFactory for FlakyFactory {
        async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                // An empty session: every navigation fails like a dead site.
                return Ok(Box::new(StaticSession::new()));
            }
            Ok(Box::new(
                StaticSession::new()
                    .with_page(
                        LIST_URL,
                        format!(r#"<a class="course" href="{DETAIL_URL}">c</a>"#),
                    )
                    .with_page(DETAIL_URL, "<h1>Persistent Course</h1>"),
            ))
        }
    }

    fn context(
        queue: Arc<JobQueue>,
        sessions: Arc<dyn crate::session::SessionFactory>,
        store: Arc<MemoryCatalogStore>,
    ) -> WorkerContext {
        let mut registry = ScraperRegistry::empty();
        registry.register(SourceType::Coursera, || Box::new(StubScraper));
        WorkerContext {
            queue,
            registry: Arc::new(registry),
            sessions,
            normalizer: Arc::new(Normalizer::new(
                store,
                Arc::new(StaticRates::usd_snapshot()),
                NormalizerConfig::default(),
            )),
            robots: Arc::new(RobotsCache::new("harvester", false)),
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            concurrency: 1,
            rate_limit: Duration::from_millis(1),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
            heartbeat_interval: Duration::from_millis(50),
            stall_timeout: ChronoDuration::minutes(5),
            sources: HashMap::new(),
        }
    }

    #[test]
    fn per_source_pacing_falls_back_to_pool_defaults() {
        let mut config = WorkerConfig::default();
        config.sources.insert(
            SourceType::FutureLearn,
            SourcePacing {
                rate_limit: Some(Duration::from_millis(4000)),
                ..Default::default()
            },
        );

        let (rate, attempts, delay) = config.pacing_for(SourceType::FutureLearn);
        assert_eq!(rate, Duration::from_millis(4000));
        // Unset fields inherit the pool-wide values.
        assert_eq!(attempts, config.retry_attempts);
        assert_eq!(delay, config.retry_delay);

        // Sources without an entry are unaffected.
        let (rate, _, _) = config.pacing_for(SourceType::Coursera);
        assert_eq!(rate, config.rate_limit);
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            JobQueue::open(dir.path().join("queue.db"), 3, ChronoDuration::zero()).unwrap(),
        );
        let store = Arc::new(MemoryCatalogStore::new());
        let sessions = Arc::new(FlakyFactory {
            created: AtomicU32::new(0),
            failures: 2,
        });

        let job = queue
            .enqueue(SourceType::Coursera, JobConfig::default(), EnqueueOpts::default())
            .unwrap();

        let pool = WorkerPool::new(context(queue.clone(), sessions, store.clone()), fast_config());
        pool.run_until_idle().await;

        let settled = queue.get(&job.id).unwrap().unwrap();
        assert_eq!(settled.state, JobState::Completed);
        assert_eq!(settled.attempts, 3);
        assert_eq!(store.count_courses().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn attempts_exhausted_means_failed() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            JobQueue::open(dir.path().join("queue.db"), 2, ChronoDuration::zero()).unwrap(),
        );
        let store = Arc::new(MemoryCatalogStore::new());
        // More failures than the attempt budget.
        let sessions = Arc::new(FlakyFactory {
            created: AtomicU32::new(0),
            failures: 10,
        });

        let job = queue
            .enqueue(SourceType::Coursera, JobConfig::default(), EnqueueOpts::default())
            .unwrap();

        let pool = WorkerPool::new(context(queue.clone(), sessions, store.clone()), fast_config());
        pool.run_until_idle().await;

        let settled = queue.get(&job.id).unwrap().unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert_eq!(settled.attempts, 2);
        assert!(settled.last_error.is_some());
        assert_eq!(store.count_courses().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_source_fails_without_retries() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            JobQueue::open(dir.path().join("queue.db"), 3, ChronoDuration::zero()).unwrap(),
        );
        let store = Arc::new(MemoryCatalogStore::new());
        let sessions = Arc::new(FlakyFactory {
            created: AtomicU32::new(0),
            failures: 0,
        });

        let job = queue
            .enqueue(SourceType::FutureLearn, JobConfig::default(), EnqueueOpts::default())
            .unwrap();

        // Registry only knows Coursera.
        let pool = WorkerPool::new(context(queue.clone(), sessions, store), fast_config());
        pool.run_until_idle().await;

        let settled = queue.get(&job.id).unwrap().unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert_eq!(settled.attempts, 1);
    }
}
