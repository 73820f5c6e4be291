//! Open University: a single-institution catalog where level comes from the
//! qualification name and durations run in months or years.

use async_trait::async_trait;

use super::{
    absolute_url, is_free, parse_duration_text, parse_money, CourseScraper, ScrapeError,
};
use crate::models::{JobConfig, RawCourseRecord, RawPricing, SourceType};
use crate::session::Session;

const CATALOG_URL: &str = "https://www.open.ac.uk/courses";
const UNIVERSITY_NAME: &str = "The Open University";

const LINK_SELECTOR: &str = "a[href*='/courses/']";
const TITLE_SELECTOR: &str = "h1";
const DESCRIPTION_SELECTORS: &[&str] = &[".course-overview p", "#course-details p", "main p"];
const FEE_SELECTORS: &[&str] = &[".fee-information", "[data-fees]", ".course-fees"];
const DURATION_SELECTORS: &[&str] = &[".study-duration", ".course-duration"];
const QUALIFICATION_SELECTORS: &[&str] = &[".qualification-title", ".course-qualification"];
const SYLLABUS_SELECTOR: &str = ".module-listing h3";
const CATEGORY_SELECTOR: &str = "a[href*='/subjects/']";

pub struct OpenUniversityScraper;

impl OpenUniversityScraper {
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

    /// Level is implied by the qualification, not stated directly.
    fn level_from_qualification(qualification: &str) -> Option<&'static str> {
        let q = qualification.to_lowercase();
        if q.contains("msc") || q.contains("ma ") || q.contains("master") || q.contains("postgraduate")
        {
            Some("postgraduate")
        } else if q.contains("ba") || q.contains("bsc") || q.contains("honours") || q.contains("degree")
        {
            Some("undergraduate")
        } else if q.contains("diploma") {
            Some("diploma")
        } else if q.contains("certificate") {
            Some("certificate")
        } else {
            None
        }
    }
}

impl Default for OpenUniversityScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseScraper for OpenUniversityScraper {
    fn source_type(&self) -> SourceType {
        SourceType::OpenUniversity
    }

    fn entrypoint(&self, config: &JobConfig) -> Result<String, ScrapeError> {
        Ok(config.url.clone().unwrap_or_else(|| CATALOG_URL.to_string()))
    }

    fn default_max_links(&self) -> usize {
        15
    }

    async fn discover_links(&self, session: &mut dyn Session) -> Vec<String> {
        session
            .extract_each_attribute(LINK_SELECTOR, "href")
            .await
            .into_iter()
            .filter_map(|href| absolute_url("https://www.open.ac.uk/", &href))
            .filter(|url| !url.ends_with("/courses") && !url.ends_with("/courses/"))
            .collect()
    }

    async fn extract_details(&self, session: &dyn Session, url: &str) -> Option<RawCourseRecord> {
        let title = session.extract_text(TITLE_SELECTOR).await?;

        let mut record = RawCourseRecord::new(url);
        record.title = title;
        record.university = UNIVERSITY_NAME.to_string();
        record.description = Self::first_text(session, DESCRIPTION_SELECTORS)
            .await
            .unwrap_or_default();

        if let Some(fee_text) = Self::first_text(session, FEE_SELECTORS).await {
            record.pricing = Some(if is_free(&fee_text) {
                RawPricing::free(fee_text)
            } else if let Some((amount, currency)) = parse_money(&fee_text) {
                RawPricing::amount(amount, currency, fee_text)
            } else {
                RawPricing {
                    display: fee_text,
                    ..Default::default()
                }
            });
        }

        if let Some(duration_text) = Self::first_text(session, DURATION_SELECTORS).await {
            record.duration = parse_duration_text(&duration_text);
        }

        if let Some(qualification) = Self::first_text(session, QUALIFICATION_SELECTORS).await {
            record.level = Self::level_from_qualification(&qualification).map(str::to_string);
            record.certification = Some(qualification);
        }

        record.syllabus = session.extract_each_text(SYLLABUS_SELECTOR).await;
        record.categories = session.extract_each_text(CATEGORY_SELECTOR).await;
        record.delivery = Some("distance learning".to_string());
        record.language = Some("english".to_string());

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticSession;

    const DETAIL: &str = r#"
        <html><body>
            <h1>Computing and IT</h1>
            <div class="course-overview"><p>Build a broad foundation across software, networks and data.</p></div>
            <span class="fee-information">£7,272 per year</span>
            <span class="study-duration">3 years full-time</span>
            <span class="qualification-title">BSc (Honours)</span>
            <div class="module-listing"><h3>Introduction to computing</h3></div>
            <a href="/subjects/computing">Computing</a>
        </body></html>
    "#;

    #[test]
    fn qualification_implies_level() {
        assert_eq!(
            OpenUniversityScraper::level_from_qualification("BSc (Honours)"),
            Some("undergraduate")
        );
        assert_eq!(
            OpenUniversityScraper::level_from_qualification("MSc Computing"),
            Some("postgraduate")
        );
        assert_eq!(
            OpenUniversityScraper::level_from_qualification("Certificate of Higher Education"),
            Some("certificate")
        );
        assert_eq!(OpenUniversityScraper::level_from_qualification("Short course"), None);
    }

    #[tokio::test]
    async fn extracts_a_full_record() {
        let url = "https://www.open.ac.uk/courses/computing-it";
        let mut session = StaticSession::new().with_page(url, DETAIL);
        session.navigate(url).await.unwrap();

        let record = OpenUniversityScraper::new()
            .extract_details(&session, url)
            .await
            .unwrap();

        assert_eq!(record.title, "Computing and IT");
        assert_eq!(record.university, UNIVERSITY_NAME);
        let pricing = record.pricing.unwrap();
        assert_eq!(pricing.amount, Some(7272.0));
        assert_eq!(pricing.currency.as_deref(), Some("GBP"));
        let duration = record.duration.unwrap();
        assert_eq!((duration.value, duration.unit.as_str()), (3.0, "year"));
        assert_eq!(record.level.as_deref(), Some("undergraduate"));
        assert_eq!(record.certification.as_deref(), Some("BSc (Honours)"));
        assert_eq!(record.delivery.as_deref(), Some("distance learning"));
    }

    #[tokio::test]
    async fn catalog_links_exclude_the_catalog_itself() {
        let listing = r#"
            <html><body>
                <a href="/courses/computing-it">Computing and IT</a>
                <a href="/courses/">All courses</a>
                <a href="/about">About</a>
            </body></html>
        "#;
        let mut session = StaticSession::new().with_page(CATALOG_URL, listing);
        session.navigate(CATALOG_URL).await.unwrap();

        let links = OpenUniversityScraper::new().discover_links(&mut session).await;
        assert_eq!(links, vec!["https://www.open.ac.uk/courses/computing-it"]);
    }
}
