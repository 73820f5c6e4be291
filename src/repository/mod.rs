//! Catalog persistence.
//!
//! The SQLite store opens a fresh connection per operation, so it can be
//! shared across worker tasks without a pool. The in-memory store exists for
//! tests and implements the same trait.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod catalog;
mod memory;

pub use catalog::SqliteCatalogStore;
pub use memory::MemoryCatalogStore;

use crate::models::{CanonicalCourse, Category, Instructor, University};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a SQLite database with the pragmas every store relies on.
pub fn connect(path: &Path) -> Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|v| {
        DateTime::parse_from_rfc3339(&v)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Storage seam between the normalizer and persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Return the university with this name, creating it if absent. Matching
    /// is case-insensitive on the trimmed name.
    async fn find_or_create_university(&self, name: &str) -> Result<University>;

    async fn find_or_create_instructor(
        &self,
        first_name: &str,
        last_name: &str,
        university_id: &str,
    ) -> Result<Instructor>;

    async fn find_or_create_category(&self, name: &str) -> Result<Category>;

    /// Insert or update by `source_url`. Returns true when a new row was
    /// created, false when an existing one was updated.
    async fn upsert_course(&self, course: &CanonicalCourse) -> Result<bool>;

    async fn get_course(&self, source_url: &str) -> Result<Option<CanonicalCourse>>;

    async fn count_courses(&self) -> Result<u64>;

    async fn count_universities(&self) -> Result<u64>;
}
