//! Data models for courseharvest.

mod course;
mod job;
mod raw;

pub use course::{
    Accessibility, CanonicalCourse, Category, Certification, CourseDuration, DeliveryMode,
    Instructor, Level, Pricing, PricingType, University,
};
pub use job::{JobConfig, JobState, QueueStats, ScrapeJob, SourceType};
pub use raw::{RawCourseRecord, RawDuration, RawPricing};

use sha2::{Digest, Sha256};

/// Derive a stable identifier from a natural key.
///
/// The same key always maps to the same id, so find-or-create and upsert
/// operations converge on one row regardless of which store backs them.
pub fn natural_id(kind: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_id_is_stable() {
        let a = natural_id("course", "https://example.com/c/1");
        let b = natural_id("course", "https://example.com/c/1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn natural_id_separates_kinds() {
        assert_ne!(natural_id("course", "x"), natural_id("category", "x"));
    }
}
