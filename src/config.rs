//! Configuration: built-in defaults, optional `config.toml` in the data
//! directory, then `COURSEHARVEST_*` environment overrides, in that order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::SourceType;
use crate::queue::{SourcePacing, WorkerConfig};
use crate::scheduler::SweepConfig;
use crate::session::SessionConfig;

pub const QUEUE_DATABASE_FILENAME: &str = "queue.db";
pub const CATALOG_DATABASE_FILENAME: &str = "catalog.db";
const CONFIG_FILENAME: &str = "config.toml";

/// Effective application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory; both databases live here.
    pub data_dir: PathBuf,
    pub queue: QueueSettings,
    pub scrape: ScrapeSettings,
    pub scheduler: SchedulerSettings,
    /// ISO code the catalog converts prices into.
    pub reference_currency: String,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub stall_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub completed_retention_hours: u64,
    pub failed_retention_hours: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: 3,
            backoff_base_ms: 30_000,
            stall_timeout_ms: 300_000,
            poll_interval_ms: 1_000,
            heartbeat_interval_ms: 15_000,
            completed_retention_hours: 24,
            failed_retention_hours: 168,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Minimum spacing between request issues, per job.
    pub rate_limit_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub navigation_timeout_ms: u64,
    pub respect_robots_txt: bool,
    /// Global detail-link cap; None defers to each scraper's default.
    pub max_links: Option<usize>,
    pub use_browser: bool,
    pub user_agent: Option<String>,
    /// Per-source overrides of the politeness fields above.
    pub sources: HashMap<SourceType, SourceOverrides>,
}

/// Politeness overrides for one source; unset fields inherit the global
/// `[scrape]` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceOverrides {
    pub rate_limit_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            rate_limit_ms: 1_500,
            retry_attempts: 3,
            retry_delay_ms: 5_000,
            navigation_timeout_ms: 30_000,
            respect_robots_txt: true,
            max_links: None,
            use_browser: true,
            user_agent: None,
            sources: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerSettings {
    pub sweeps: SweepConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Data dir fallback chain: XDG data dir, then home, then CWD.
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courseharvest");

        Self {
            data_dir,
            queue: QueueSettings::default(),
            scrape: ScrapeSettings::default(),
            scheduler: SchedulerSettings::default(),
            reference_currency: "USD".to_string(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then `config.toml` in the data directory,
    /// then environment overrides.
    pub fn load(data_dir: Option<PathBuf>) -> Self {
        let mut settings = Settings::default();
        if let Some(dir) = data_dir {
            settings.data_dir = dir;
        }

        let config_path = settings.data_dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            match ConfigFile::load(&config_path) {
                Ok(file) => file.apply(&mut settings),
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "Ignoring unreadable config file");
                }
            }
        }

        settings.apply_env();
        settings
    }

    fn apply_env(&mut self) {
        if let Some(dir) = env_var("COURSEHARVEST_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_parse("COURSEHARVEST_CONCURRENCY") {
            self.queue.concurrency = v;
        }
        if let Some(v) = env_parse("COURSEHARVEST_MAX_ATTEMPTS") {
            self.queue.max_attempts = v;
        }
        if let Some(v) = env_parse("COURSEHARVEST_RATE_LIMIT_MS") {
            self.scrape.rate_limit_ms = v;
        }
        if let Some(v) = env_var("COURSEHARVEST_RESPECT_ROBOTS") {
            self.scrape.respect_robots_txt = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = env_var("COURSEHARVEST_USE_BROWSER") {
            self.scrape.use_browser = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = env_var("COURSEHARVEST_USER_AGENT") {
            self.scrape.user_agent = Some(v);
        }
        if let Some(v) = env_var("COURSEHARVEST_REFERENCE_CURRENCY") {
            self.reference_currency = v;
        }
    }

    pub fn queue_db_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_DATABASE_FILENAME)
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_DATABASE_FILENAME)
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }

    /// Effective scrape settings for one source: its overrides where set,
    /// the global `[scrape]` block otherwise.
    pub fn scrape_for(&self, source: SourceType) -> ScrapeSettings {
        let mut merged = self.scrape.clone();
        if let Some(o) = self.scrape.sources.get(&source) {
            apply_opt(&mut merged.rate_limit_ms, o.rate_limit_ms);
            apply_opt(&mut merged.retry_attempts, o.retry_attempts);
            apply_opt(&mut merged.retry_delay_ms, o.retry_delay_ms);
            apply_opt(&mut merged.navigation_timeout_ms, o.navigation_timeout_ms);
        }
        merged
    }

    pub fn session_config(&self) -> SessionConfig {
        Self::session_config_from(&self.scrape)
    }

    /// Session config honoring a source's `navigation_timeout_ms` override.
    pub fn session_config_for(&self, source: SourceType) -> SessionConfig {
        Self::session_config_from(&self.scrape_for(source))
    }

    fn session_config_from(scrape: &ScrapeSettings) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(ua) = &scrape.user_agent {
            config.user_agent = ua.clone();
        }
        config.navigation_timeout = Duration::from_millis(scrape.navigation_timeout_ms);
        config
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let sources = self
            .scrape
            .sources
            .iter()
            .map(|(source, o)| {
                (
                    *source,
                    SourcePacing {
                        rate_limit: o.rate_limit_ms.map(Duration::from_millis),
                        retry_attempts: o.retry_attempts,
                        retry_delay: o.retry_delay_ms.map(Duration::from_millis),
                    },
                )
            })
            .collect();

        WorkerConfig {
            concurrency: self.queue.concurrency,
            rate_limit: Duration::from_millis(self.scrape.rate_limit_ms),
            retry_attempts: self.scrape.retry_attempts,
            retry_delay: Duration::from_millis(self.scrape.retry_delay_ms),
            poll_interval: Duration::from_millis(self.queue.poll_interval_ms),
            heartbeat_interval: Duration::from_millis(self.queue.heartbeat_interval_ms),
            stall_timeout: chrono::Duration::milliseconds(self.queue.stall_timeout_ms as i64),
            sources,
        }
    }

    pub fn backoff_base(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.queue.backoff_base_ms as i64)
    }

    /// Effective user agent for robots.txt matching.
    pub fn robots_user_agent(&self) -> String {
        self.scrape
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("courseharvest/{}", env!("CARGO_PKG_VERSION")))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|s| s.parse().ok())
}

/// `config.toml` structure; every field optional, absent means default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub reference_currency: Option<String>,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub scrape: ScrapeSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSection {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub stall_timeout_ms: Option<u64>,
    pub completed_retention_hours: Option<u64>,
    pub failed_retention_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeSection {
    pub rate_limit_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub respect_robots_txt: Option<bool>,
    pub max_links: Option<usize>,
    pub use_browser: Option<bool>,
    pub user_agent: Option<String>,
    /// `[scrape.sources.<source-type>]` tables, keyed by source type name.
    #[serde(default)]
    pub sources: HashMap<String, SourceOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSection {
    pub daily_catalog_cron: Option<String>,
    pub platform_cron: Option<String>,
    pub weekly_cron: Option<String>,
    pub search_queries: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("failed to read config file: {e}"))?;
        toml::from_str(&contents).map_err(|e| format!("failed to parse config file: {e}"))
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.data_dir {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(currency) = &self.reference_currency {
            settings.reference_currency = currency.clone();
        }

        let q = &self.queue;
        apply_opt(&mut settings.queue.concurrency, q.concurrency);
        apply_opt(&mut settings.queue.max_attempts, q.max_attempts);
        apply_opt(&mut settings.queue.backoff_base_ms, q.backoff_base_ms);
        apply_opt(&mut settings.queue.stall_timeout_ms, q.stall_timeout_ms);
        apply_opt(
            &mut settings.queue.completed_retention_hours,
            q.completed_retention_hours,
        );
        apply_opt(
            &mut settings.queue.failed_retention_hours,
            q.failed_retention_hours,
        );

        let s = &self.scrape;
        apply_opt(&mut settings.scrape.rate_limit_ms, s.rate_limit_ms);
        apply_opt(&mut settings.scrape.retry_attempts, s.retry_attempts);
        apply_opt(&mut settings.scrape.retry_delay_ms, s.retry_delay_ms);
        apply_opt(
            &mut settings.scrape.navigation_timeout_ms,
            s.navigation_timeout_ms,
        );
        apply_opt(
            &mut settings.scrape.respect_robots_txt,
            s.respect_robots_txt,
        );
        apply_opt(&mut settings.scrape.use_browser, s.use_browser);
        if s.max_links.is_some() {
            settings.scrape.max_links = s.max_links;
        }
        if s.user_agent.is_some() {
            settings.scrape.user_agent = s.user_agent.clone();
        }
        for (name, overrides) in &s.sources {
            match SourceType::parse(name) {
                Some(source) => {
                    settings.scrape.sources.insert(source, overrides.clone());
                }
                None => {
                    tracing::warn!(source = %name, "Ignoring overrides for unknown source type");
                }
            }
        }

        let sched = &self.scheduler;
        apply_opt(
            &mut settings.scheduler.sweeps.daily_catalog_cron,
            sched.daily_catalog_cron.clone(),
        );
        apply_opt(
            &mut settings.scheduler.sweeps.platform_cron,
            sched.platform_cron.clone(),
        );
        apply_opt(
            &mut settings.scheduler.sweeps.weekly_cron,
            sched.weekly_cron.clone(),
        );
        apply_opt(
            &mut settings.scheduler.sweeps.search_queries,
            sched.search_queries.clone(),
        );
    }
}

fn apply_opt<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            r#"
            reference_currency = "GBP"

            [queue]
            concurrency = 4

            [scrape]
            rate_limit_ms = 250
            respect_robots_txt = false

            [scheduler]
            search_queries = ["rust"]
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(dir.path().to_path_buf()));
        assert_eq!(settings.reference_currency, "GBP");
        assert_eq!(settings.queue.concurrency, 4);
        assert_eq!(settings.scrape.rate_limit_ms, 250);
        assert!(!settings.scrape.respect_robots_txt);
        assert_eq!(settings.scheduler.sweeps.search_queries, vec!["rust"]);
        // Untouched values keep their defaults.
        assert_eq!(settings.queue.max_attempts, 3);
    }

    #[test]
    fn per_source_overrides_inherit_the_global_block() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            r#"
            [scrape]
            rate_limit_ms = 1000

            [scrape.sources.open-university]
            rate_limit_ms = 4000
            retry_attempts = 5

            [scrape.sources.udemy]
            rate_limit_ms = 9000
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(dir.path().to_path_buf()));
        let ou = settings.scrape_for(SourceType::OpenUniversity);
        assert_eq!(ou.rate_limit_ms, 4000);
        assert_eq!(ou.retry_attempts, 5);
        // Unset fields and other sources inherit the global block.
        assert_eq!(ou.retry_delay_ms, 5_000);
        assert_eq!(settings.scrape_for(SourceType::Coursera).rate_limit_ms, 1000);
        // Unknown source tables are dropped, not crashed on.
        assert_eq!(settings.scrape.sources.len(), 1);

        let worker = settings.worker_config();
        let (rate, attempts, _) = worker.pacing_for(SourceType::OpenUniversity);
        assert_eq!(rate, Duration::from_millis(4000));
        assert_eq!(attempts, 5);
        let (rate, _, _) = worker.pacing_for(SourceType::FutureLearn);
        assert_eq!(rate, Duration::from_millis(1000));
    }

    #[test]
    fn missing_config_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(dir.path().to_path_buf()));
        assert_eq!(settings.queue.concurrency, 2);
        assert_eq!(settings.scrape.rate_limit_ms, 1_500);
        assert!(settings.scrape.respect_robots_txt);
    }

    #[test]
    fn database_paths_live_in_the_data_dir() {
        let settings = Settings::load(Some(PathBuf::from("/tmp/ch-test")));
        assert_eq!(settings.queue_db_path(), PathBuf::from("/tmp/ch-test/queue.db"));
        assert_eq!(
            settings.catalog_db_path(),
            PathBuf::from("/tmp/ch-test/catalog.db")
        );
    }
}
