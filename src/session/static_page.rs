//! Fixed-content session for offline extraction tests and selector debugging.

use std::collections::HashMap;

use async_trait::async_trait;

use super::select;
use super::{Session, SessionError};

/// A session whose pages are supplied up front.
///
/// Navigating to a registered URL switches the current document; navigating
/// anywhere else fails the way a dead link would. Every navigation is
/// recorded so tests can assert on pacing and robots behavior.
#[derive(Default)]
pub struct StaticSession {
    pages: HashMap<String, String>,
    current: String,
    navigations: Vec<String>,
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page body for a URL.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }
}

#[async_trait]
impl Session for StaticSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.navigations.push(url.to_string());
        match self.pages.get(url) {
            Some(html) => {
                self.current = html.clone();
                Ok(())
            }
            None => Err(SessionError::Navigation {
                url: url.to_string(),
                message: "no such page".to_string(),
            }),
        }
    }

    async fn extract_text(&self, selector: &str) -> Option<String> {
        select::first_text(&self.current, selector)
    }

    async fn extract_attribute(&self, selector: &str, attr: &str) -> Option<String> {
        select::first_attribute(&self.current, selector, attr)
    }

    async fn extract_each_text(&self, selector: &str) -> Vec<String> {
        select::each_text(&self.current, selector)
    }

    async fn extract_each_attribute(&self, selector: &str, attr: &str) -> Vec<String> {
        select::each_attribute(&self.current, selector, attr)
    }

    async fn scroll_to_bottom(&mut self, _max_scrolls: u32) -> u32 {
        0
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, SessionError> {
        Err(SessionError::Unsupported("screenshot of a static page"))
    }

    async fn cleanup(&mut self) {
        self.current.clear();
    }
}
