//! End-to-end pipeline: enqueue, scrape through a fixed-content session,
//! normalize, and land in the catalog.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use courseharvest::compliance::RobotsCache;
use courseharvest::ingest::{Normalizer, NormalizerConfig, StaticRates};
use courseharvest::models::{JobConfig, JobState, RawCourseRecord, RawPricing, SourceType};
use courseharvest::queue::{EnqueueOpts, JobQueue, WorkerConfig, WorkerContext, WorkerPool};
use courseharvest::repository::{CatalogStore, MemoryCatalogStore};
use courseharvest::scrapers::{CourseScraper, ScrapeError, ScraperRegistry};
use courseharvest::session::{Session, SessionError, SessionFactory, StaticSession};

const LIST_URL: &str = "https://campus.example.edu/courses";
const GOOD_URL: &str = "https://campus.example.edu/courses/databases";
const JUNK_URL: &str = "https://campus.example.edu/courses/untitled";

struct CampusScraper;

#[async_trait]
impl CourseScraper for CampusScraper {
    fn source_type(&self) -> SourceType {
        SourceType::OpenUniversity
    }

    fn entrypoint(&self, config: &JobConfig) -> Result<String, ScrapeError> {
        Ok(config.url.clone().unwrap_or_else(|| LIST_URL.to_string()))
    }

    fn default_max_links(&self) -> usize {
        10
    }

    async fn discover_links(&self, session: &mut dyn Session) -> Vec<String> {
        session.extract_each_attribute("a.course", "href").await
    }

    async fn extract_details(&self, session: &dyn Session, url: &str) -> Option<RawCourseRecord> {
        let mut record = RawCourseRecord::new(url);
        // Junk pages produce a record missing its title; the normalizer
        // rejects it downstream.
        record.title = session.extract_text("h1").await.unwrap_or_default();
        record.university = "Example Campus".to_string();
        record.description = session
            .extract_text(".description")
            .await
            .unwrap_or_default();
        record.instructors = session.extract_each_text(".instructor").await;
        record.pricing = session
            .extract_text(".price")
            .await
            .and_then(|p| {
                let amount: f64 = p.trim_start_matches('£').parse().ok()?;
                Some(RawPricing::amount(amount, "GBP", p))
            });
        Some(record)
    }
}

struct CampusSessions;

#[async_trait]
impl SessionFactory for CampusSessions {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        Ok(Box::new(
            StaticSession::new()
                .with_page(
                    LIST_URL,
                    format!(
                        r#"<html><body>
                            <a class="course" href="{GOOD_URL}">Databases</a>
                            <a class="course" href="{JUNK_URL}">???</a>
                        </body></html>"#
                    ),
                )
                .with_page(
                    GOOD_URL,
                    r#"<html><body>
                        <h1>Introduction to Databases</h1>
                        <p class="description">Relational modeling, SQL, and transactions from first principles.</p>
                        <span class="instructor">Grace Hopper</span>
                        <span class="price">£120</span>
                    </body></html>"#,
                )
                .with_page(JUNK_URL, "<html><body><p>Coming soon</p></body></html>"),
        ))
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
        ..WorkerConfig::default()
    }
}

fn build_context(
    queue: Arc<JobQueue>,
    store: Arc<MemoryCatalogStore>,
    sessions: Arc<dyn SessionFactory>,
) -> WorkerContext {
    let mut registry = ScraperRegistry::empty();
    registry.register(SourceType::OpenUniversity, || Box::new(CampusScraper));
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

#[tokio::test]
async fn enqueued_job_lands_one_canonical_course() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(
        JobQueue::open(dir.path().join("queue.db"), 3, chrono::Duration::zero()).unwrap(),
    );
    let store = Arc::new(MemoryCatalogStore::new());

    let job = queue
        .enqueue(
            SourceType::OpenUniversity,
            JobConfig::default(),
            EnqueueOpts::default(),
        )
        .unwrap();

    let pool = WorkerPool::new(
        build_context(queue.clone(), store.clone(), Arc::new(CampusSessions)),
        fast_config(),
    );
    pool.run_until_idle().await;

    // The junk page is rejected by the normalizer, not a job failure.
    let settled = queue.get(&job.id).unwrap().unwrap();
    assert_eq!(settled.state, JobState::Completed);
    assert_eq!(settled.attempts, 1);

    assert_eq!(store.count_courses().await.unwrap(), 1);
    let course = store.get_course(GOOD_URL).await.unwrap().unwrap();
    assert_eq!(course.title, "Introduction to Databases");
    // GBP converted into the USD reference at the snapshot rate.
    assert_eq!(course.pricing.amount, Some(152.4));
    assert_eq!(course.pricing.original_amount, Some(120.0));
    assert_eq!(course.instructor_ids.len(), 1);

    let stats = queue.stats().unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn rescrape_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(
        JobQueue::open(dir.path().join("queue.db"), 3, chrono::Duration::zero()).unwrap(),
    );
    let store = Arc::new(MemoryCatalogStore::new());

    for _ in 0..2 {
        queue
            .enqueue(
                SourceType::OpenUniversity,
                JobConfig::default(),
                EnqueueOpts::default(),
            )
            .unwrap();
    }

    let pool = WorkerPool::new(
        build_context(queue.clone(), store.clone(), Arc::new(CampusSessions)),
        fast_config(),
    );
    pool.run_until_idle().await;

    assert_eq!(queue.stats().unwrap().completed, 2);
    // Same source URL both times: still exactly one catalog row.
    assert_eq!(store.count_courses().await.unwrap(), 1);
}
