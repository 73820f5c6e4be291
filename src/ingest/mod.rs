//! Ingestion: validate raw scrape output, normalize it, and upsert into the
//! catalog.
//!
//! A raw record either becomes exactly one canonical upsert or is rejected
//! whole; nothing partial ever reaches the store.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

pub mod currency;
pub mod duration;
pub mod text;
pub mod vocab;

pub use currency::{RateProvider, StaticRates};

use crate::models::{
    Accessibility, CanonicalCourse, Certification, Pricing, PricingType, RawCourseRecord,
    RawPricing,
};
use crate::repository::{CatalogStore, RepositoryError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What happened to one raw record.
#[derive(Debug)]
pub enum IngestOutcome {
    Ingested { course_id: String, created: bool },
    Rejected { reason: String },
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Records with shorter descriptions are rejected as junk extractions.
    pub min_description_len: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_description_len: 20,
        }
    }
}

/// Converts raw scrape records into canonical catalog rows.
pub struct Normalizer {
    store: Arc<dyn CatalogStore>,
    rates: Arc<dyn RateProvider>,
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        rates: Arc<dyn RateProvider>,
        config: NormalizerConfig,
    ) -> Self {
        Self {
            store,
            rates,
            config,
        }
    }

    /// Validate, normalize, and upsert one raw record.
    pub async fn ingest(&self, raw: &RawCourseRecord) -> Result<IngestOutcome, IngestError> {
        if let Some(reason) = self.validate(raw) {
            debug!(source_url = %raw.source_url, %reason, "Rejected raw record");
            return Ok(IngestOutcome::Rejected { reason });
        }

        let title = text::clean_text(&raw.title);
        let description = text::clean_text(&raw.description);
        let university_name = text::clean_text(&raw.university);

        let university = self.store.find_or_create_university(&university_name).await?;

        let mut instructor_ids = Vec::new();
        for name in text::clean_list(&raw.instructors) {
            let (first, last) = crate::models::Instructor::split_name(&name);
            let instructor = self
                .store
                .find_or_create_instructor(&first, &last, &university.id)
                .await?;
            instructor_ids.push(instructor.id);
        }

        let mut category_ids = Vec::new();
        for name in text::clean_list(&raw.categories) {
            let category = self.store.find_or_create_category(&name).await?;
            category_ids.push(category.id);
        }

        let course = CanonicalCourse {
            id: CanonicalCourse::id_for(&raw.source_url),
            source_url: raw.source_url.clone(),
            title,
            description,
            pricing: self.normalize_pricing(raw.pricing.as_ref()),
            duration: duration::normalize(raw.duration.as_ref()),
            level: vocab::map_level(raw.level.as_deref().unwrap_or("")),
            language: vocab::map_language(raw.language.as_deref().unwrap_or("")),
            delivery: vocab::map_delivery(raw.delivery.as_deref().unwrap_or("")),
            university_id: university.id,
            instructor_ids,
            category_ids,
            certification: Certification {
                available: raw.certification.is_some(),
                name: raw.certification.as_ref().map(|s| text::clean_text(s)),
            },
            accessibility: accessibility_from_raw(&raw.raw_data),
            scraped_at: raw.scraped_at,
            updated_at: raw.scraped_at,
        };

        let created = self.store.upsert_course(&course).await?;
        info!(
            course_id = %course.id,
            source_url = %course.source_url,
            created,
            "Ingested course"
        );
        Ok(IngestOutcome::Ingested {
            course_id: course.id,
            created,
        })
    }

    /// Gate on the fields a canonical record cannot exist without.
    fn validate(&self, raw: &RawCourseRecord) -> Option<String> {
        if text::clean_text(&raw.title).is_empty() {
            return Some("missing title".to_string());
        }
        if text::clean_text(&raw.university).is_empty() {
            return Some("missing university".to_string());
        }
        if text::clean_text(&raw.description).chars().count() < self.config.min_description_len {
            return Some(format!(
                "description shorter than {} characters",
                self.config.min_description_len
            ));
        }
        None
    }

    fn normalize_pricing(&self, raw: Option<&RawPricing>) -> Pricing {
        let reference = self.rates.reference_currency().to_string();
        let Some(raw) = raw else {
            return Pricing {
                kind: PricingType::Unknown,
                currency: reference,
                ..Default::default()
            };
        };

        if raw.free {
            return Pricing {
                kind: PricingType::Free,
                amount: Some(0.0),
                currency: reference,
                display: Some(raw.display.clone()),
                ..Default::default()
            };
        }

        let kind = if raw.subscription {
            PricingType::Subscription
        } else if raw.amount.is_some() {
            PricingType::OneTime
        } else {
            PricingType::Unknown
        };

        // Unknown currencies keep the original amount but leave the
        // converted amount unset.
        let converted = match (raw.amount, raw.currency.as_deref()) {
            (Some(amount), Some(currency)) => self.rates.convert(amount, currency),
            _ => None,
        };

        Pricing {
            kind,
            amount: converted,
            currency: reference,
            original_amount: raw.amount,
            original_currency: raw.currency.clone(),
            display: Some(raw.display.clone()),
        }
    }
}

fn accessibility_from_raw(raw_data: &serde_json::Value) -> Accessibility {
    let features = raw_data
        .get("accessibility")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| text::clean_text(s))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Accessibility { features }
}
