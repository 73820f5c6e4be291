//! Scrape job model and queue state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of scraper variants.
///
/// Dispatch is keyed on this enum rather than free-form strings so an unknown
/// source type is rejected when the job is created, not when a worker picks
/// it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Learning platform, search-driven listings with lazy loading.
    #[serde(rename = "coursera")]
    Coursera,
    /// Learning platform, week-based courses with subscription pricing.
    #[serde(rename = "futurelearn")]
    FutureLearn,
    /// University catalog with qualification-level courses.
    #[serde(rename = "open-university")]
    OpenUniversity,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coursera => "coursera",
            Self::FutureLearn => "futurelearn",
            Self::OpenUniversity => "open-university",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coursera" => Some(Self::Coursera),
            "futurelearn" => Some(Self::FutureLearn),
            "open-university" | "openuniversity" | "open_university" => Some(Self::OpenUniversity),
            _ => None,
        }
    }

    /// All known variants, in dispatch-registration order.
    pub fn all() -> &'static [SourceType] {
        &[Self::Coursera, Self::FutureLearn, Self::OpenUniversity]
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown source type '{}'. Valid options: coursera, futurelearn, open-university",
                s
            )
        })
    }
}

/// Per-job configuration supplied at enqueue time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Entry listing URL. Falls back to the scraper's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Search query for search-driven platforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Cap on detail links processed in this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_links: Option<usize>,
}

/// Job lifecycle states.
///
/// `waiting -> active -> completed | failed`; a failed job with attempts left
/// goes back to `waiting` with a deferred eligibility time. "Delayed" is not
/// a stored state: it is a waiting job whose eligibility lies in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable scrape job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: String,
    pub source_type: SourceType,
    pub config: JobConfig,
    pub priority: i32,
    pub state: JobState,
    /// Attempts made so far (incremented when a worker claims the job).
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest dispatch time; enqueue delay and retry backoff both land here.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScrapeJob {
    /// Create a new waiting job, eligible after `delay`.
    pub fn new(
        source_type: SourceType,
        config: JobConfig,
        priority: i32,
        delay: chrono::Duration,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_type,
            config,
            priority,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts,
            run_at: now + delay,
            created_at: now,
            started_at: None,
            finished_at: None,
            heartbeat_at: None,
            last_error: None,
        }
    }
}

/// Queue counts per state, as surfaced to operators.
///
/// The buckets are disjoint: a waiting job whose eligibility time lies in the
/// future counts under `delayed` and is excluded from `waiting`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Waiting jobs eligible to run now.
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    /// Waiting jobs whose eligibility time is still in the future.
    pub delayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips() {
        for st in SourceType::all() {
            assert_eq!(SourceType::parse(st.as_str()), Some(*st));
        }
        assert_eq!(SourceType::parse("open_university"), Some(SourceType::OpenUniversity));
        assert_eq!(SourceType::parse("udemy"), None);
    }

    #[test]
    fn job_state_round_trips() {
        for s in ["waiting", "active", "completed", "failed"] {
            assert_eq!(JobState::parse(s).unwrap().as_str(), s);
        }
        assert_eq!(JobState::parse("stalled"), None);
    }

    #[test]
    fn new_job_starts_waiting() {
        let job = ScrapeJob::new(
            SourceType::Coursera,
            JobConfig::default(),
            0,
            chrono::Duration::zero(),
            3,
        );
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 0);
        assert!(job.run_at <= Utc::now());
    }
}
