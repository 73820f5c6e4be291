//! Source type to scraper constructor mapping.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CourseScraper, CourseraScraper, FutureLearnScraper, OpenUniversityScraper};
use crate::models::SourceType;

type Factory = Arc<dyn Fn() -> Box<dyn CourseScraper> + Send + Sync>;

pub struct ScraperRegistry {
    factories: HashMap<SourceType, Factory>,
}

impl ScraperRegistry {
    /// Registry with every built-in scraper.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(SourceType::Coursera, || Box::new(CourseraScraper::new()));
        registry.register(SourceType::FutureLearn, || {
            Box::new(FutureLearnScraper::new())
        });
        registry.register(SourceType::OpenUniversity, || {
            Box::new(OpenUniversityScraper::new())
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, source_type: SourceType, factory: F)
    where
        F: Fn() -> Box<dyn CourseScraper> + Send + Sync + 'static,
    {
        self.factories.insert(source_type, Arc::new(factory));
    }

    /// New scraper instance, or None for an unregistered source type.
    pub fn create(&self, source_type: SourceType) -> Option<Box<dyn CourseScraper>> {
        self.factories.get(&source_type).map(|f| f())
    }

    pub fn registered(&self) -> Vec<SourceType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_source_type() {
        let registry = ScraperRegistry::builtin();
        for source_type in SourceType::all() {
            let scraper = registry.create(*source_type).unwrap();
            assert_eq!(scraper.source_type(), *source_type);
        }
    }
}
