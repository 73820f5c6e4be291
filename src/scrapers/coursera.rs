//! Coursera: search-driven listings with lazy loading, USD pricing, and
//! hour-based effort estimates.

use async_trait::async_trait;
use tracing::debug;

use super::{
    absolute_url, is_free, parse_duration_text, parse_money, CourseScraper, ScrapeError,
};
use crate::models::{JobConfig, RawCourseRecord, RawPricing, SourceType};
use crate::session::Session;

const SEARCH_URL: &str = "https://www.coursera.org/search?query=";
const DEFAULT_QUERY: &str = "computer science";

const LINK_SELECTOR: &str = "a[href*='/learn/']";
const TITLE_SELECTORS: &[&str] = &["h1[data-e2e='hero-title']", "h1"];
const PARTNER_SELECTORS: &[&str] = &["[data-e2e='partner-name']", "a[href*='/partners/'] span"];
const DESCRIPTION_SELECTORS: &[&str] = &["[data-e2e='description'] p", ".about-section p", "main p"];
const PRICE_SELECTORS: &[&str] = &["[data-e2e='price']", ".rc-Price"];
const DURATION_SELECTORS: &[&str] = &["[data-e2e='duration']", ".rc-WeekView span"];
const INSTRUCTOR_SELECTOR: &str = "a[href*='/instructor/'] span";
const SYLLABUS_SELECTOR: &str = "[data-e2e='sdp-syllabus'] h3";
const LEVEL_SELECTOR: &str = "[data-e2e='level']";
const LANGUAGE_SELECTOR: &str = "[data-e2e='language']";
const CATEGORY_SELECTOR: &str = "a[href*='/browse/'] span";

pub struct CourseraScraper;

impl CourseraScraper {
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
}

impl Default for CourseraScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseScraper for CourseraScraper {
    fn source_type(&self) -> SourceType {
        SourceType::Coursera
    }

    fn entrypoint(&self, config: &JobConfig) -> Result<String, ScrapeError> {
        if let Some(url) = &config.url {
            return Ok(url.clone());
        }
        let query = config.search_query.as_deref().unwrap_or(DEFAULT_QUERY);
        Ok(format!("{SEARCH_URL}{}", urlencoding::encode(query)))
    }

    fn default_max_links(&self) -> usize {
        12
    }

    async fn discover_links(&self, session: &mut dyn Session) -> Vec<String> {
        // Results load lazily as the page scrolls.
        let scrolls = session.scroll_to_bottom(8).await;
        debug!(scrolls, "Scrolled search results");

        session
            .extract_each_attribute(LINK_SELECTOR, "href")
            .await
            .into_iter()
            .filter_map(|href| absolute_url("https://www.coursera.org/", &href))
            .collect()
    }

    async fn extract_details(&self, session: &dyn Session, url: &str) -> Option<RawCourseRecord> {
        let title = Self::first_text(session, TITLE_SELECTORS).await?;

        let mut record = RawCourseRecord::new(url);
        record.title = title;
        record.university = Self::first_text(session, PARTNER_SELECTORS)
            .await
            .unwrap_or_default();
        record.description = Self::first_text(session, DESCRIPTION_SELECTORS)
            .await
            .unwrap_or_default();

        if let Some(price_text) = Self::first_text(session, PRICE_SELECTORS).await {
            record.pricing = Some(if is_free(&price_text) {
                RawPricing::free(price_text)
            } else if price_text.to_lowercase().contains("/month") {
                RawPricing {
                    subscription: true,
                    ..parse_money(&price_text)
                        .map(|(amount, currency)| {
                            RawPricing::amount(amount, currency, price_text.clone())
                        })
                        .unwrap_or_else(|| RawPricing {
                            display: price_text.clone(),
                            ..Default::default()
                        })
                }
            } else if let Some((amount, currency)) = parse_money(&price_text) {
                // Bare "$" on this site means USD.
                RawPricing::amount(amount, currency, price_text)
            } else {
                RawPricing {
                    display: price_text,
                    ..Default::default()
                }
            });
        }

        if let Some(duration_text) = Self::first_text(session, DURATION_SELECTORS).await {
            record.duration = parse_duration_text(&duration_text);
        }

        record.instructors = session.extract_each_text(INSTRUCTOR_SELECTOR).await;
        record.syllabus = session.extract_each_text(SYLLABUS_SELECTOR).await;
        record.level = session.extract_text(LEVEL_SELECTOR).await;
        record.language = session.extract_text(LANGUAGE_SELECTOR).await;
        record.delivery = Some("online".to_string());
        record.categories = session.extract_each_text(CATEGORY_SELECTOR).await;
        if record.title.to_lowercase().contains("certificate")
            || session
                .extract_text("[data-e2e='certificate']")
                .await
                .is_some()
        {
            record.certification = Some("Course Certificate".to_string());
        }

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticSession;

    const DETAIL: &str = r#"
        <html><body>
            <h1 data-e2e="hero-title">Machine Learning</h1>
            <span data-e2e="partner-name">Stanford University</span>
            <div data-e2e="description"><p>Learn the foundations of machine learning from the ground up.</p></div>
            <span data-e2e="price">$49</span>
            <span data-e2e="duration">Approx. 60 hours to complete</span>
            <a href="/instructor/ng"><span>Andrew Ng</span></a>
            <div data-e2e="sdp-syllabus"><h3>Week 1: Regression</h3><h3>Week 2: Classification</h3></div>
            <span data-e2e="level">Beginner</span>
            <span data-e2e="language">English</span>
            <a href="/browse/data-science"><span>Data Science</span></a>
        </body></html>
    "#;

    #[test]
    fn entrypoint_prefers_explicit_url_then_query() {
        let scraper = CourseraScraper::new();
        let config = JobConfig {
            url: Some("https://www.coursera.org/search?query=rust".to_string()),
            ..Default::default()
        };
        assert_eq!(
            scraper.entrypoint(&config).unwrap(),
            "https://www.coursera.org/search?query=rust"
        );

        let config = JobConfig {
            search_query: Some("data science".to_string()),
            ..Default::default()
        };
        assert_eq!(
            scraper.entrypoint(&config).unwrap(),
            "https://www.coursera.org/search?query=data%20science"
        );
    }

    #[tokio::test]
    async fn discovers_learn_links_as_absolute_urls() {
        let listing = r#"
            <html><body>
                <a href="/learn/machine-learning">ML</a>
                <a href="/learn/rust-fundamentals">Rust</a>
                <a href="/browse/data-science">not a course</a>
            </body></html>
        "#;
        let mut session = StaticSession::new().with_page("https://www.coursera.org/search", listing);
        session
            .navigate("https://www.coursera.org/search")
            .await
            .unwrap();

        let links = CourseraScraper::new().discover_links(&mut session).await;
        assert_eq!(
            links,
            vec![
                "https://www.coursera.org/learn/machine-learning",
                "https://www.coursera.org/learn/rust-fundamentals",
            ]
        );
    }

    #[tokio::test]
    async fn extracts_a_full_record() {
        let url = "https://www.coursera.org/learn/machine-learning";
        let mut session = StaticSession::new().with_page(url, DETAIL);
        session.navigate(url).await.unwrap();

        let record = CourseraScraper::new()
            .extract_details(&session, url)
            .await
            .unwrap();

        assert_eq!(record.title, "Machine Learning");
        assert_eq!(record.university, "Stanford University");
        let pricing = record.pricing.unwrap();
        assert_eq!(pricing.amount, Some(49.0));
        assert_eq!(pricing.currency.as_deref(), Some("USD"));
        let duration = record.duration.unwrap();
        assert_eq!((duration.value, duration.unit.as_str()), (60.0, "hour"));
        assert_eq!(record.instructors, vec!["Andrew Ng"]);
        assert_eq!(record.syllabus.len(), 2);
        assert_eq!(record.level.as_deref(), Some("Beginner"));
        assert_eq!(record.categories, vec!["Data Science"]);
    }

    #[tokio::test]
    async fn missing_title_yields_nothing() {
        let url = "https://www.coursera.org/learn/empty";
        let mut session = StaticSession::new().with_page(url, "<html><body></body></html>");
        session.navigate(url).await.unwrap();

        assert!(CourseraScraper::new()
            .extract_details(&session, url)
            .await
            .is_none());
    }
}
