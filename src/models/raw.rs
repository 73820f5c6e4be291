//! Raw scrape output, owned by the worker that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form bag of fields extracted from one detail page.
///
/// Nothing here is validated or normalized; the only identity a raw record
/// carries is its `source_url`. A record is either fully converted into one
/// canonical upsert or fully discarded by the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCourseRecord {
    pub title: String,
    pub university: String,
    pub description: String,
    pub pricing: Option<RawPricing>,
    pub duration: Option<RawDuration>,
    pub instructors: Vec<String>,
    pub syllabus: Vec<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub delivery: Option<String>,
    pub categories: Vec<String>,
    pub certification: Option<String>,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
    /// Anything site-specific worth keeping that has no mapped field.
    pub raw_data: serde_json::Value,
}

impl RawCourseRecord {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            scraped_at: Utc::now(),
            raw_data: serde_json::json!({}),
            ..Default::default()
        }
    }
}

/// Price as the source page displayed it, in its local currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPricing {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// Original display string, e.g. "£1,234" or "Free".
    pub display: String,
    pub free: bool,
    pub subscription: bool,
}

impl RawPricing {
    pub fn free(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            free: true,
            ..Default::default()
        }
    }

    pub fn amount(amount: f64, currency: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            currency: Some(currency.into()),
            display: display.into(),
            ..Default::default()
        }
    }
}

/// Duration in whatever unit the source page used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDuration {
    pub value: f64,
    /// "hour", "day", "week", "month" or "year".
    pub unit: String,
    /// Original display string, preserved for the canonical record.
    pub display: String,
}

impl RawDuration {
    pub fn new(value: f64, unit: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            display: display.into(),
        }
    }
}
