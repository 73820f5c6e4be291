//! SQLite-backed catalog store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{connect, parse_datetime, CatalogStore, Result};
use crate::models::{
    Accessibility, CanonicalCourse, Category, Certification, CourseDuration, DeliveryMode,
    Instructor, Level, Pricing, University,
};

/// Catalog store that opens a fresh connection per operation.
pub struct SqliteCatalogStore {
    db_path: PathBuf,
}

impl SqliteCatalogStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
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
            CREATE TABLE IF NOT EXISTS universities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS instructors (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                university_id TEXT NOT NULL REFERENCES universities(id)
            );

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS courses (
                id TEXT NOT NULL,
                source_url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                pricing TEXT NOT NULL,
                duration TEXT NOT NULL,
                level TEXT NOT NULL,
                language TEXT NOT NULL,
                delivery TEXT NOT NULL,
                university_id TEXT NOT NULL REFERENCES universities(id),
                instructor_ids TEXT NOT NULL,
                category_ids TEXT NOT NULL,
                certification TEXT NOT NULL,
                accessibility TEXT NOT NULL,
                scraped_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_courses_university
                ON courses(university_id);
            "#,
        )?;
        Ok(())
    }

    fn row_to_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanonicalCourse> {
        let pricing: String = row.get("pricing")?;
        let duration: String = row.get("duration")?;
        let instructor_ids: String = row.get("instructor_ids")?;
        let category_ids: String = row.get("category_ids")?;
        let certification: String = row.get("certification")?;
        let accessibility: String = row.get("accessibility")?;
        let level: String = row.get("level")?;
        let delivery: String = row.get("delivery")?;
        let scraped_at: String = row.get("scraped_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(CanonicalCourse {
            id: row.get("id")?,
            source_url: row.get("source_url")?,
            title: row.get("title")?,
            description: row.get("description")?,
            pricing: serde_json::from_str::<Pricing>(&pricing).unwrap_or_default(),
            duration: serde_json::from_str::<CourseDuration>(&duration).unwrap_or_default(),
            level: Level::parse(&level),
            language: row.get("language")?,
            delivery: DeliveryMode::parse(&delivery),
            university_id: row.get("university_id")?,
            instructor_ids: serde_json::from_str(&instructor_ids).unwrap_or_default(),
            category_ids: serde_json::from_str(&category_ids).unwrap_or_default(),
            certification: serde_json::from_str::<Certification>(&certification)
                .unwrap_or_default(),
            accessibility: serde_json::from_str::<Accessibility>(&accessibility)
                .unwrap_or_default(),
            scraped_at: parse_datetime(&scraped_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_or_create_university(&self, name: &str) -> Result<University> {
        let conn = self.conn()?;
        let key = University::name_key(name);
        let id = University::id_for(name);
        conn.execute(
            "INSERT OR IGNORE INTO universities (id, name, name_key, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, name.trim(), key, Utc::now().to_rfc3339()],
        )?;
        let row = conn.query_row(
            "SELECT id, name FROM universities WHERE name_key = ?1",
            params![key],
            |row| {
                Ok(University {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;
        Ok(row)
    }

    async fn find_or_create_instructor(
        &self,
        first_name: &str,
        last_name: &str,
        university_id: &str,
    ) -> Result<Instructor> {
        let conn = self.conn()?;
        let id = Instructor::id_for(first_name, last_name, university_id);
        conn.execute(
            "INSERT OR IGNORE INTO instructors (id, first_name, last_name, university_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, first_name, last_name, university_id],
        )?;
        let row = conn.query_row(
            "SELECT id, first_name, last_name, university_id FROM instructors WHERE id = ?1",
            params![id],
            |row| {
                Ok(Instructor {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    university_id: row.get(3)?,
                })
            },
        )?;
        Ok(row)
    }

    async fn find_or_create_category(&self, name: &str) -> Result<Category> {
        let conn = self.conn()?;
        let key = Category::name_key(name);
        let id = Category::id_for(name);
        conn.execute(
            "INSERT OR IGNORE INTO categories (id, name, name_key) VALUES (?1, ?2, ?3)",
            params![id, name.trim(), key],
        )?;
        let row = conn.query_row(
            "SELECT id, name FROM categories WHERE name_key = ?1",
            params![key],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;
        Ok(row)
    }

    async fn upsert_course(&self, course: &CanonicalCourse) -> Result<bool> {
        let conn = self.conn()?;
        let pricing = serde_json::to_string(&course.pricing)?;
        let duration = serde_json::to_string(&course.duration)?;
        let instructor_ids = serde_json::to_string(&course.instructor_ids)?;
        let category_ids = serde_json::to_string(&course.category_ids)?;
        let certification = serde_json::to_string(&course.certification)?;
        let accessibility = serde_json::to_string(&course.accessibility)?;
        let now = Utc::now().to_rfc3339();

        conn.execute_batch("BEGIN IMMEDIATE")?;
        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM courses WHERE source_url = ?1",
                params![course.source_url],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        conn.execute(
            "INSERT INTO courses (
                id, source_url, title, description, pricing, duration,
                level, language, delivery, university_id, instructor_ids,
                category_ids, certification, accessibility, scraped_at,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(source_url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                pricing = excluded.pricing,
                duration = excluded.duration,
                level = excluded.level,
                language = excluded.language,
                delivery = excluded.delivery,
                university_id = excluded.university_id,
                instructor_ids = excluded.instructor_ids,
                category_ids = excluded.category_ids,
                certification = excluded.certification,
                accessibility = excluded.accessibility,
                scraped_at = excluded.scraped_at,
                updated_at = excluded.updated_at",
            params![
                course.id,
                course.source_url,
                course.title,
                course.description,
                pricing,
                duration,
                course.level.as_str(),
                course.language,
                course.delivery.as_str(),
                course.university_id,
                instructor_ids,
                category_ids,
                certification,
                accessibility,
                course.scraped_at.to_rfc3339(),
                now,
                now,
            ],
        )?;
        conn.execute_batch("COMMIT")?;

        debug!(
            source_url = %course.source_url,
            created = !existed,
            "Upserted course"
        );
        Ok(!existed)
    }

    async fn get_course(&self, source_url: &str) -> Result<Option<CanonicalCourse>> {
        let conn = self.conn()?;
        let course = conn
            .query_row(
                "SELECT * FROM courses WHERE source_url = ?1",
                params![source_url],
                Self::row_to_course,
            )
            .optional()?;
        Ok(course)
    }

    async fn count_courses(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn count_universities(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM universities", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
