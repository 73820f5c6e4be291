//! Shared CSS selection over fetched HTML.
//!
//! `scraper::Html` is not `Send`, so parsing happens inside these synchronous
//! helpers and never crosses an await point.

use scraper::{Html, Selector};
use tracing::warn;

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Invalid selector '{}': {}", selector, e);
            None
        }
    }
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub(crate) fn first_text(html: &str, selector: &str) -> Option<String> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    let text = doc.select(&sel).next().map(element_text)?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn first_attribute(html: &str, selector: &str, attr: &str) -> Option<String> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr).map(|v| v.to_string()))
}

pub(crate) fn each_text(html: &str, selector: &str) -> Vec<String> {
    let Some(sel) = parse_selector(selector) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

pub(crate) fn each_attribute(html: &str, selector: &str, attr: &str) -> Vec<String> {
    let Some(sel) = parse_selector(selector) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr).map(|v| v.to_string()))
        .collect()
}
