//! SQLite-backed job rows.
//!
//! Claims take a `BEGIN IMMEDIATE` write transaction so two workers can never
//! select the same waiting job. Like the catalog store, every operation opens
//! its own connection.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::models::{JobConfig, JobState, QueueStats, ScrapeJob, SourceType};
use crate::repository::{connect, parse_datetime, parse_datetime_opt, Result};

pub struct JobStore {
    db_path: PathBuf,
    /// Base of the exponential retry backoff: `base * 2^(attempts-1)`.
    backoff_base: Duration,
}

impl JobStore {
    pub fn new(db_path: impl AsRef<Path>, backoff_base: Duration) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            backoff_base,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                config TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                run_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                heartbeat_at TEXT,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_claim
                ON jobs(state, run_at, priority);

            CREATE TABLE IF NOT EXISTS queue_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn insert(&self, job: &ScrapeJob) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO jobs (
                id, source_type, config, priority, state, attempts,
                max_attempts, run_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.source_type.as_str(),
                serde_json::to_string(&job.config)?,
                job.priority,
                job.state.as_str(),
                job.attempts,
                job.max_attempts,
                job.run_at.to_rfc3339(),
                job.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Atomically claim the next eligible waiting job, if any.
    ///
    /// Eligibility: waiting state and `run_at` in the past. Higher priority
    /// first, then oldest eligibility time.
    pub fn claim_next(&self) -> Result<Option<ScrapeJob>> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute_batch("BEGIN IMMEDIATE")?;
        let claimed = conn
            .query_row(
                "SELECT * FROM jobs
                 WHERE state = 'waiting' AND run_at <= ?1
                 ORDER BY priority DESC, run_at ASC
                 LIMIT 1",
                params![now],
                Self::row_to_job,
            )
            .optional()?;

        let job = match claimed {
            Some(mut job) => {
                conn.execute(
                    "UPDATE jobs SET
                        state = 'active',
                        attempts = attempts + 1,
                        started_at = ?2,
                        heartbeat_at = ?2
                     WHERE id = ?1",
                    params![job.id, now],
                )?;
                job.state = JobState::Active;
                job.attempts += 1;
                job.started_at = Some(Utc::now());
                job.heartbeat_at = job.started_at;
                Some(job)
            }
            None => None,
        };
        conn.execute_batch("COMMIT")?;
        Ok(job)
    }

    pub fn complete(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE jobs SET state = 'completed', finished_at = ?2, last_error = NULL
             WHERE id = ?1",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record a failed attempt. With attempts left the job goes back to
    /// waiting with exponential backoff; otherwise it fails for good.
    pub fn fail(&self, job: &ScrapeJob, error: &str) -> Result<()> {
        let conn = self.conn()?;
        if job.attempts < job.max_attempts {
            let backoff = self.backoff_base * 2_i32.pow(job.attempts.saturating_sub(1));
            let run_at = Utc::now() + backoff;
            warn!(
                job_id = %job.id,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                retry_at = %run_at,
                error,
                "Job attempt failed, will retry"
            );
            conn.execute(
                "UPDATE jobs SET state = 'waiting', run_at = ?2, last_error = ?3
                 WHERE id = ?1",
                params![job.id, run_at.to_rfc3339(), error],
            )?;
        } else {
            warn!(job_id = %job.id, attempts = job.attempts, error, "Job failed permanently");
            conn.execute(
                "UPDATE jobs SET state = 'failed', finished_at = ?2, last_error = ?3
                 WHERE id = ?1",
                params![job.id, Utc::now().to_rfc3339(), error],
            )?;
        }
        Ok(())
    }

    /// Fail immediately with no retries, for errors retrying cannot fix.
    pub fn fail_permanent(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.conn()?;
        warn!(job_id = %id, error, "Job failed permanently (not retryable)");
        conn.execute(
            "UPDATE jobs SET state = 'failed', finished_at = ?2, last_error = ?3
             WHERE id = ?1",
            params![id, Utc::now().to_rfc3339(), error],
        )?;
        Ok(())
    }

    pub fn heartbeat(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE jobs SET heartbeat_at = ?2 WHERE id = ?1 AND state = 'active'",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Return active jobs whose heartbeat went stale to the waiting state.
    /// Crash recovery: a worker that died mid-job stops heartbeating.
    pub fn recover_stalled(&self, stall_timeout: Duration) -> Result<u64> {
        let conn = self.conn()?;
        let cutoff = (Utc::now() - stall_timeout).to_rfc3339();
        let now = Utc::now().to_rfc3339();
        let recovered = conn.execute(
            "UPDATE jobs SET state = 'waiting', run_at = ?1, last_error = 'stalled: worker stopped heartbeating'
             WHERE state = 'active' AND (heartbeat_at IS NULL OR heartbeat_at < ?2)",
            params![now, cutoff],
        )?;
        if recovered > 0 {
            info!(recovered, "Recovered stalled jobs");
        }
        Ok(recovered as u64)
    }

    /// Delete finished jobs older than the given retention windows.
    pub fn clean(&self, completed_older_than: Duration, failed_older_than: Duration) -> Result<u64> {
        let conn = self.conn()?;
        let completed_cutoff = (Utc::now() - completed_older_than).to_rfc3339();
        let failed_cutoff = (Utc::now() - failed_older_than).to_rfc3339();
        let removed = conn.execute(
            "DELETE FROM jobs WHERE
                (state = 'completed' AND finished_at < ?1)
                OR (state = 'failed' AND finished_at < ?2)",
            params![completed_cutoff, failed_cutoff],
        )?;
        debug!(removed, "Cleaned finished jobs");
        Ok(removed as u64)
    }

    /// Put every failed job back in the waiting state with a fresh attempt
    /// budget.
    pub fn retry_failed(&self) -> Result<u64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let retried = conn.execute(
            "UPDATE jobs SET state = 'waiting', attempts = 0, run_at = ?1,
                finished_at = NULL, last_error = NULL
             WHERE state = 'failed'",
            params![now],
        )?;
        Ok(retried as u64)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<ScrapeJob>> {
        let conn = self.conn()?;
        let job = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], Self::row_to_job)
            .optional()?;
        Ok(job)
    }

    pub fn list(&self, state: Option<JobState>, limit: usize) -> Result<Vec<ScrapeJob>> {
        let conn = self.conn()?;
        let mut jobs = Vec::new();
        match state {
            Some(state) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM jobs WHERE state = ?1
                     ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![state.as_str(), limit as i64], Self::row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit as i64], Self::row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
        }
        Ok(jobs)
    }

    /// Disjoint per-bucket counts: a waiting job with a future `run_at`
    /// counts as delayed, not waiting.
    pub fn stats(&self) -> Result<QueueStats> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let mut stats = QueueStats::default();

        let mut stmt = conn.prepare(
            "SELECT CASE
                 WHEN state = 'waiting' AND run_at > ?1 THEN 'delayed'
                 ELSE state
             END AS bucket, COUNT(*)
             FROM jobs GROUP BY bucket",
        )?;
        let rows = stmt.query_map(params![now], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (bucket, count) = row?;
            match bucket.as_str() {
                "waiting" => stats.waiting = count as u64,
                "delayed" => stats.delayed = count as u64,
                "active" => stats.active = count as u64,
                "completed" => stats.completed = count as u64,
                "failed" => stats.failed = count as u64,
                _ => {}
            }
        }

        Ok(stats)
    }

    pub fn set_paused(&self, paused: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO queue_meta (key, value) VALUES ('paused', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![if paused { "1" } else { "0" }],
        )?;
        Ok(())
    }

    pub fn is_paused(&self) -> Result<bool> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM queue_meta WHERE key = 'paused'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref() == Some("1"))
    }

    fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScrapeJob> {
        let source_type: String = row.get("source_type")?;
        let config: String = row.get("config")?;
        let state: String = row.get("state")?;
        let run_at: String = row.get("run_at")?;
        let created_at: String = row.get("created_at")?;

        Ok(ScrapeJob {
            id: row.get("id")?,
            source_type: SourceType::parse(&source_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown source type '{source_type}'").into(),
                )
            })?,
            config: serde_json::from_str::<JobConfig>(&config).unwrap_or_default(),
            priority: row.get("priority")?,
            state: JobState::parse(&state).unwrap_or(JobState::Failed),
            attempts: row.get("attempts")?,
            max_attempts: row.get("max_attempts")?,
            run_at: parse_datetime(&run_at),
            created_at: parse_datetime(&created_at),
            started_at: parse_datetime_opt(row.get("started_at")?),
            finished_at: parse_datetime_opt(row.get("finished_at")?),
            heartbeat_at: parse_datetime_opt(row.get("heartbeat_at")?),
            last_error: row.get("last_error")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path().join("queue.db"), Duration::zero()).unwrap();
        (dir, store)
    }

    fn job(priority: i32, delay: Duration) -> ScrapeJob {
        ScrapeJob::new(
            SourceType::Coursera,
            JobConfig::default(),
            priority,
            delay,
            3,
        )
    }

    #[test]
    fn claim_respects_priority_then_age() {
        let (_dir, store) = store();
        let low = job(0, Duration::zero());
        let high = job(5, Duration::zero());
        store.insert(&low).unwrap();
        store.insert(&high).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, high.id);
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts, 1);

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, low.id);

        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn delayed_jobs_are_not_claimable() {
        let (_dir, store) = store();
        store.insert(&job(0, Duration::hours(1))).unwrap();
        assert!(store.claim_next().unwrap().is_none());

        // A deferred job is delayed, and only delayed.
        let stats = store.stats().unwrap();
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.delayed, 1);
    }

    #[test]
    fn fail_requeues_until_attempts_run_out() {
        let (_dir, store) = store();
        store.insert(&job(0, Duration::zero())).unwrap();

        for expected_attempt in 1..=3u32 {
            let claimed = store.claim_next().unwrap().unwrap();
            assert_eq!(claimed.attempts, expected_attempt);
            store.fail(&claimed, "boom").unwrap();
        }

        assert!(store.claim_next().unwrap().is_none());
        let stats = store.stats().unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting, 0);
    }

    #[test]
    fn retry_failed_resets_the_attempt_budget() {
        let (_dir, store) = store();
        let j = job(0, Duration::zero());
        store.insert(&j).unwrap();
        store.fail_permanent(&j.id, "bad config").unwrap();
        assert_eq!(store.stats().unwrap().failed, 1);

        assert_eq!(store.retry_failed().unwrap(), 1);
        let reloaded = store.get(&j.id).unwrap().unwrap();
        assert_eq!(reloaded.state, JobState::Waiting);
        assert_eq!(reloaded.attempts, 0);
        assert!(reloaded.last_error.is_none());
    }

    #[test]
    fn stalled_active_jobs_go_back_to_waiting() {
        let (_dir, store) = store();
        store.insert(&job(0, Duration::zero())).unwrap();
        let claimed = store.claim_next().unwrap().unwrap();

        // A fresh heartbeat is not stalled.
        assert_eq!(store.recover_stalled(Duration::minutes(5)).unwrap(), 0);
        // Zero timeout treats any heartbeat as stale.
        assert_eq!(store.recover_stalled(Duration::zero()).unwrap(), 1);

        let reclaimed = store.claim_next().unwrap().unwrap();
        assert_eq!(reclaimed.id, claimed.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[test]
    fn clean_removes_old_finished_jobs_only() {
        let (_dir, store) = store();
        let done = job(0, Duration::zero());
        let pending = job(0, Duration::zero());
        store.insert(&done).unwrap();
        store.insert(&pending).unwrap();
        store.complete(&done.id).unwrap();

        // Retention in the future keeps everything.
        assert_eq!(store.clean(Duration::hours(1), Duration::hours(1)).unwrap(), 0);
        // Zero retention drops the completed job but never waiting ones.
        assert_eq!(
            store.clean(Duration::zero() - Duration::seconds(1), Duration::zero()).unwrap(),
            1
        );
        assert_eq!(store.stats().unwrap().waiting, 1);
    }

    #[test]
    fn pause_flag_round_trips() {
        let (_dir, store) = store();
        assert!(!store.is_paused().unwrap());
        store.set_paused(true).unwrap();
        assert!(store.is_paused().unwrap());
        store.set_paused(false).unwrap();
        assert!(!store.is_paused().unwrap());
    }
}
