//! Automation sessions for driving source websites.
//!
//! A session owns one browser-like context per scrape run. Navigation is
//! fallible and retried by the compliance layer; selector extraction is
//! local and silent: a missing element yields the caller's default rather
//! than an error, because external page structure is unreliable by nature.

#[cfg(feature = "browser")]
mod browser;
mod http;
mod select;
mod static_page;

#[cfg(feature = "browser")]
pub use browser::{BrowserSession, BrowserSessionFactory};
pub use http::{HttpSession, HttpSessionFactory};
pub use static_page::StaticSession;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from session startup and navigation.
///
/// Extraction primitives never return errors; only navigation and lifecycle
/// operations can fail.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start automation session: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out after {ms}ms")]
    Timeout { url: String, ms: u64 },

    #[error("Operation not supported by this session: {0}")]
    Unsupported(&'static str),
}

/// Session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Page-load bound; exceeding it is a page-level failure, not a hang.
    pub navigation_timeout: Duration,
    /// Short wait for a selector to appear before the default kicks in.
    pub selector_timeout: Duration,
    /// Never fetch images/fonts/styles; cuts cost and detection surface.
    pub block_resources: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/120.0 Safari/537.36 courseharvest/",
                env!("CARGO_PKG_VERSION"),
            )
            .to_string(),
            viewport: (1920, 1080),
            navigation_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(5),
            block_resources: true,
        }
    }
}

/// One owned automation context.
#[async_trait]
pub trait Session: Send + Sync {
    /// Load a page, waiting for it to settle or for the navigation timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Text of the first element matching `selector`, or None.
    async fn extract_text(&self, selector: &str) -> Option<String>;

    /// Attribute of the first element matching `selector`, or None.
    async fn extract_attribute(&self, selector: &str, attr: &str) -> Option<String>;

    /// Text of every element matching `selector`.
    async fn extract_each_text(&self, selector: &str) -> Vec<String>;

    /// Attribute of every element matching `selector`, skipping elements
    /// without it.
    async fn extract_each_attribute(&self, selector: &str, attr: &str) -> Vec<String>;

    /// Scroll until page height stops growing or the budget runs out.
    /// Returns the number of scrolls performed.
    async fn scroll_to_bottom(&mut self, max_scrolls: u32) -> u32;

    /// PNG screenshot of the current page, for debugging.
    async fn screenshot(&mut self) -> Result<Vec<u8>, SessionError>;

    /// Release the automation context. Called on every exit path of a run.
    async fn cleanup(&mut self);

    /// Text of the first match, or the supplied default.
    async fn text_or(&self, selector: &str, default: &str) -> String {
        self.extract_text(selector)
            .await
            .unwrap_or_else(|| default.to_string())
    }
}

/// Creates sessions for workers; injected so tests can substitute fakes.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError>;
}
