//! Per-source scrapers.
//!
//! Each variant knows one site's URL shapes and selectors and nothing about
//! pacing, retries, or persistence. The runner drives a scraper through a
//! session; the registry maps source types to constructors.

mod coursera;
mod futurelearn;
mod open_university;
mod registry;
mod runner;

pub use coursera::CourseraScraper;
pub use futurelearn::FutureLearnScraper;
pub use open_university::OpenUniversityScraper;
pub use registry::ScraperRegistry;
pub use runner::{ScrapeReport, ScrapeRunner};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{JobConfig, RawCourseRecord, RawDuration, SourceType};
use crate::session::{Session, SessionError};

/// Job-level scrape failures. Page-level extraction problems never surface
/// here; they only shrink the report.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid job config: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// robots.txt disallows the entrypoint; retrying cannot help.
    #[error("entrypoint denied by robots.txt: {0}")]
    EntryDenied(String),

    #[error("entrypoint unreachable: {0}")]
    EntryFailed(String),
}

/// One site's scraping strategy.
#[async_trait]
pub trait CourseScraper: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Resolve the job config into the listing URL to start from.
    fn entrypoint(&self, config: &JobConfig) -> Result<String, ScrapeError>;

    /// Cap on detail pages per run when the job doesn't set one.
    fn default_max_links(&self) -> usize;

    /// Collect candidate detail-page URLs from the current listing page.
    async fn discover_links(&self, session: &mut dyn Session) -> Vec<String>;

    /// Extract one course from the current detail page. None means the page
    /// didn't yield a usable record.
    async fn extract_details(&self, session: &dyn Session, url: &str) -> Option<RawCourseRecord>;
}

/// Parse an amount and currency out of a price string like "£1,234.50",
/// "$49", or "49.99 USD".
pub(crate) fn parse_money(text: &str) -> Option<(f64, String)> {
    let symbol_currency = [("£", "GBP"), ("€", "EUR"), ("$", "USD")]
        .iter()
        .find(|(sym, _)| text.contains(sym))
        .map(|(_, code)| code.to_string());

    let code_currency = regex::Regex::new(r"\b(USD|GBP|EUR|CAD|AUD|INR|JPY|CNY)\b")
        .ok()?
        .find(&text.to_uppercase())
        .map(|m| m.as_str().to_string());

    let currency = symbol_currency.or(code_currency)?;

    let amount_re = regex::Regex::new(r"(\d[\d,]*(?:\.\d+)?)").ok()?;
    let raw = amount_re.find(text)?.as_str().replace(',', "");
    let amount: f64 = raw.parse().ok()?;
    if amount < 0.0 {
        return None;
    }
    Some((amount, currency))
}

/// Whether a price string means the course is free. A parseable non-zero
/// amount always wins, so "Free trial, then £49" is not free.
pub(crate) fn is_free(text: &str) -> bool {
    if let Some((amount, _)) = parse_money(text) {
        return amount == 0.0;
    }
    if matches!(text.trim(), "0" | "0.00") {
        return true;
    }
    regex::Regex::new(r"(?i)\bfree\b")
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Parse a duration phrase like "6 weeks", "Approx. 70 hours to complete",
/// or "3 months part-time".
pub(crate) fn parse_duration_text(text: &str) -> Option<RawDuration> {
    let re =
        regex::Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(hours?|hrs?|days?|weeks?|wks?|months?|years?|yrs?)")
            .ok()?;
    let caps = re.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let unit = unit.trim_end_matches('s');
    let unit = match unit {
        "hr" => "hour",
        "wk" => "week",
        "yr" => "year",
        other => other,
    };
    Some(RawDuration::new(
        value,
        unit,
        crate::ingest::text::clean_text(text),
    ))
}

/// Resolve a possibly-relative href against the page it appeared on.
pub(crate) fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Deduplicate while keeping first-seen order.
pub(crate) fn dedupe_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_symbols_and_codes() {
        assert_eq!(parse_money("£1,234.50"), Some((1234.5, "GBP".into())));
        assert_eq!(parse_money("$49"), Some((49.0, "USD".into())));
        assert_eq!(parse_money("49.99 usd"), Some((49.99, "USD".into())));
        assert_eq!(parse_money("Contact us"), None);
    }

    #[test]
    fn free_detection() {
        assert!(is_free("Free"));
        assert!(is_free("Join for free"));
        assert!(is_free("£0"));
        assert!(!is_free("£49"));
        // "free" next to a real price is marketing, not a price.
        assert!(!is_free("Free trial included, then £49"));
        assert!(!is_free("Freedom course, $25"));
    }

    #[test]
    fn duration_phrases() {
        let d = parse_duration_text("Approx. 70 hours to complete").unwrap();
        assert_eq!((d.value, d.unit.as_str()), (70.0, "hour"));

        let d = parse_duration_text("6 weeks").unwrap();
        assert_eq!((d.value, d.unit.as_str()), (6.0, "week"));

        let d = parse_duration_text("3 months part-time").unwrap();
        assert_eq!((d.value, d.unit.as_str()), (3.0, "month"));

        assert!(parse_duration_text("Self-paced").is_none());
    }

    #[test]
    fn url_resolution() {
        assert_eq!(
            absolute_url("https://example.edu/catalog", "/learn/rust").as_deref(),
            Some("https://example.edu/learn/rust")
        );
        assert_eq!(
            absolute_url("https://example.edu/", "https://other.edu/c").as_deref(),
            Some("https://other.edu/c")
        );
        assert_eq!(absolute_url("https://example.edu/", "javascript:void(0)"), None);
    }

    #[test]
    fn dedupe_keeps_order() {
        let urls = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(dedupe_preserving_order(urls), vec!["a", "b"]);
    }
}
