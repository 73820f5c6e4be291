//! FutureLearn: week-based courses, GBP pricing, free tier plus an
//! Unlimited subscription.

use async_trait::async_trait;

use super::{
    absolute_url, is_free, parse_duration_text, parse_money, CourseScraper, ScrapeError,
};
use crate::models::{JobConfig, RawCourseRecord, RawPricing, SourceType};
use crate::session::Session;

const SEARCH_URL: &str = "https://www.futurelearn.com/search?q=";
const DEFAULT_URL: &str = "https://www.futurelearn.com/courses";

const LINK_SELECTOR: &str = "a[href*='/courses/']";
const TITLE_SELECTOR: &str = "h1";
const UNIVERSITY_SELECTORS: &[&str] = &[".m-partner-title", "a[href*='/partners/']"];
const DESCRIPTION_SELECTORS: &[&str] = &[".course-description p", "[data-testid='course-description']", "main p"];
const PRICE_SELECTORS: &[&str] = &[".m-price", "[data-testid='price']"];
const DURATION_SELECTORS: &[&str] = &["[data-testid='duration']", ".m-key-info__duration"];
const INSTRUCTOR_SELECTOR: &str = ".m-educator__name";
const SYLLABUS_SELECTOR: &str = ".syllabus-section h3";
const CATEGORY_SELECTOR: &str = "a[href*='/subjects/']";
const CERTIFICATE_SELECTOR: &str = "[data-testid='certificate']";

pub struct FutureLearnScraper;

impl FutureLearnScraper {
    pub fn new() -> Self {
        Self
    }

    async fn first_text(session: &dyn Session, selectors: &[&str]) -> Option<String> {
        for selector in selectors {
            if let Some(text) = session.extract_text(selector).await {
                return Some(text);
            }
        }
        None
    }

    fn pricing_from(text: String) -> RawPricing {
        let lower = text.to_lowercase();
        if is_free(&text) {
            RawPricing::free(text)
        } else if lower.contains("unlimited") || lower.contains("/month") || lower.contains("per month")
        {
            let mut pricing = match parse_money(&text) {
                Some((amount, currency)) => RawPricing::amount(amount, currency, text),
                None => RawPricing {
                    display: text,
                    ..Default::default()
                },
            };
            pricing.subscription = true;
            pricing
        } else if let Some((amount, currency)) = parse_money(&text) {
            RawPricing::amount(amount, currency, text)
        } else {
            RawPricing {
                display: text,
                ..Default::default()
            }
        }
    }
}

impl Default for FutureLearnScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseScraper for FutureLearnScraper {
    fn source_type(&self) -> SourceType {
        SourceType::FutureLearn
    }

    fn entrypoint(&self, config: &JobConfig) -> Result<String, ScrapeError> {
        if let Some(url) = &config.url {
            return Ok(url.clone());
        }
        match &config.search_query {
            Some(query) => Ok(format!("{SEARCH_URL}{}", urlencoding::encode(query))),
            None => Ok(DEFAULT_URL.to_string()),
        }
    }

    fn default_max_links(&self) -> usize {
        12
    }

    async fn discover_links(&self, session: &mut dyn Session) -> Vec<String> {
        session.scroll_to_bottom(4).await;
        session
            .extract_each_attribute(LINK_SELECTOR, "href")
            .await
            .into_iter()
            .filter_map(|href| absolute_url("https://www.futurelearn.com/", &href))
            // The listing itself matches the detail-link shape.
            .filter(|url| *url != DEFAULT_URL && !url.ends_with("/courses"))
            .collect()
    }

    async fn extract_details(&self, session: &dyn Session, url: &str) -> Option<RawCourseRecord> {
        let title = session.extract_text(TITLE_SELECTOR).await?;

        let mut record = RawCourseRecord::new(url);
        record.title = title;
        record.university = Self::first_text(session, UNIVERSITY_SELECTORS)
            .await
            .unwrap_or_default();
        record.description = Self::first_text(session, DESCRIPTION_SELECTORS)
            .await
            .unwrap_or_default();
        record.pricing = Self::first_text(session, PRICE_SELECTORS)
            .await
            .map(Self::pricing_from);
        if let Some(duration_text) = Self::first_text(session, DURATION_SELECTORS).await {
            record.duration = parse_duration_text(&duration_text);
        }
        record.instructors = session.extract_each_text(INSTRUCTOR_SELECTOR).await;
        record.syllabus = session.extract_each_text(SYLLABUS_SELECTOR).await;
        record.categories = session.extract_each_text(CATEGORY_SELECTOR).await;
        record.delivery = Some("online".to_string());
        if let Some(cert) = session.extract_text(CERTIFICATE_SELECTOR).await {
            record.certification = Some(cert);
        }

        Some(record)
    }
}
