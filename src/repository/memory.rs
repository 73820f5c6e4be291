//! In-memory catalog store for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CatalogStore, Result};
use crate::models::{CanonicalCourse, Category, Instructor, University};

#[derive(Default)]
struct Inner {
    universities: HashMap<String, University>,
    instructors: HashMap<String, Instructor>,
    categories: HashMap<String, Category>,
    courses: HashMap<String, CanonicalCourse>,
}

/// HashMap-backed store with the same semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: Mutex<Inner>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_or_create_university(&self, name: &str) -> Result<University> {
        let key = University::name_key(name);
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .universities
            .entry(key)
            .or_insert_with(|| University {
                id: University::id_for(name),
                name: name.trim().to_string(),
            })
            .clone())
    }

    async fn find_or_create_instructor(
        &self,
        first_name: &str,
        last_name: &str,
        university_id: &str,
    ) -> Result<Instructor> {
        let id = Instructor::id_for(first_name, last_name, university_id);
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .instructors
            .entry(id.clone())
            .or_insert_with(|| Instructor {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                university_id: university_id.to_string(),
            })
            .clone())
    }

    async fn find_or_create_category(&self, name: &str) -> Result<Category> {
        let key = Category::name_key(name);
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .categories
            .entry(key)
            .or_insert_with(|| Category {
                id: Category::id_for(name),
                name: name.trim().to_string(),
            })
            .clone())
    }

    async fn upsert_course(&self, course: &CanonicalCourse) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let created = !inner.courses.contains_key(&course.source_url);
        inner
            .courses
            .insert(course.source_url.clone(), course.clone());
        Ok(created)
    }

    async fn get_course(&self, source_url: &str) -> Result<Option<CanonicalCourse>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.courses.get(source_url).cloned())
    }

    async fn count_courses(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().courses.len() as u64)
    }

    async fn count_universities(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().universities.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn university_match_is_case_insensitive() {
        let store = MemoryCatalogStore::new();
        let a = store.find_or_create_university("MIT").await.unwrap();
        let b = store.find_or_create_university("  mit ").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.count_universities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn instructor_is_scoped_to_university() {
        let store = MemoryCatalogStore::new();
        let a = store
            .find_or_create_instructor("Ada", "Lovelace", "u1")
            .await
            .unwrap();
        let b = store
            .find_or_create_instructor("Ada", "Lovelace", "u2")
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }
}
