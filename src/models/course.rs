//! Canonical catalog entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pricing model of a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    Free,
    #[serde(rename = "one-time")]
    OneTime,
    Subscription,
    #[default]
    Unknown,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::OneTime => "one-time",
            Self::Subscription => "subscription",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "free" => Self::Free,
            "one-time" => Self::OneTime,
            "subscription" => Self::Subscription,
            _ => Self::Unknown,
        }
    }
}

/// Normalized pricing.
///
/// `amount` is always in the reference currency; the original amount and
/// currency are preserved unchanged for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub kind: PricingType,
    pub amount: Option<f64>,
    pub currency: String,
    pub original_amount: Option<f64>,
    pub original_currency: Option<String>,
    pub display: Option<String>,
}

/// Duration normalized to weeks for cross-source comparability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseDuration {
    pub weeks: Option<u32>,
    /// The source's original wording, e.g. "approx. 70 hours".
    pub display: Option<String>,
}

/// Fixed level vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    #[serde(rename = "all-levels")]
    AllLevels,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::AllLevels => "all-levels",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "beginner" => Self::Beginner,
            "intermediate" => Self::Intermediate,
            "advanced" => Self::Advanced,
            _ => Self::AllLevels,
        }
    }
}

/// Fixed delivery vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Online,
    #[serde(rename = "in-person")]
    InPerson,
    Hybrid,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::InPerson => "in-person",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in-person" => Self::InPerson,
            "hybrid" => Self::Hybrid,
            _ => Self::Online,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accessibility {
    /// Free-form feature tags, e.g. "subtitles", "transcripts".
    #[serde(default)]
    pub features: Vec<String>,
}

/// Persisted course record, one row per distinct source page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCourse {
    /// Stable id derived from `source_url`.
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub description: String,
    pub pricing: Pricing,
    pub duration: CourseDuration,
    pub level: Level,
    /// Lowercase language name, e.g. "english".
    pub language: String,
    pub delivery: DeliveryMode,
    pub university_id: String,
    pub instructor_ids: Vec<String>,
    pub category_ids: Vec<String>,
    pub certification: Certification,
    pub accessibility: Accessibility,
    /// When the source page was last scraped.
    pub scraped_at: DateTime<Utc>,
    /// Stamped on every re-scrape of the same URL.
    pub updated_at: DateTime<Utc>,
}

impl CanonicalCourse {
    /// Stable course id for a source URL.
    pub fn id_for(source_url: &str) -> String {
        super::natural_id("course", source_url)
    }
}

/// Referenced entity: created lazily, matched case-insensitively on name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub id: String,
    pub name: String,
}

impl University {
    /// Case-insensitive natural key.
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn id_for(name: &str) -> String {
        super::natural_id("university", &Self::name_key(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub university_id: String,
}

impl Instructor {
    /// Split a display name into first/last; everything after the first word
    /// becomes the last name.
    pub fn split_name(full: &str) -> (String, String) {
        let mut parts = full.split_whitespace();
        let first = parts.next().unwrap_or("").to_string();
        let last = parts.collect::<Vec<_>>().join(" ");
        (first, last)
    }

    pub fn id_for(first: &str, last: &str, university_id: &str) -> String {
        let key = format!(
            "{}|{}|{}",
            university_id,
            first.trim().to_lowercase(),
            last.trim().to_lowercase()
        );
        super::natural_id("instructor", &key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn id_for(name: &str) -> String {
        super::natural_id("category", &Self::name_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn university_id_is_case_insensitive() {
        assert_eq!(University::id_for("MIT"), University::id_for("mit"));
        assert_eq!(University::id_for(" MIT "), University::id_for("MIT"));
    }

    #[test]
    fn instructor_name_split() {
        assert_eq!(
            Instructor::split_name("Ada Lovelace"),
            ("Ada".into(), "Lovelace".into())
        );
        assert_eq!(
            Instructor::split_name("Jean-Luc van der Berg"),
            ("Jean-Luc".into(), "van der Berg".into())
        );
        assert_eq!(Instructor::split_name("Plato"), ("Plato".into(), "".into()));
    }

    #[test]
    fn vocab_enums_round_trip() {
        assert_eq!(Level::parse(Level::Beginner.as_str()), Level::Beginner);
        assert_eq!(
            DeliveryMode::parse(DeliveryMode::Hybrid.as_str()),
            DeliveryMode::Hybrid
        );
        assert_eq!(
            PricingType::parse(PricingType::Subscription.as_str()),
            PricingType::Subscription
        );
    }
}
