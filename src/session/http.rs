//! Plain-HTTP session for static sites.
//!
//! Fetches pages with reqwest and evaluates selectors over the raw HTML.
//! Sites that render listings client-side need the browser session instead.

use async_trait::async_trait;
use tracing::debug;

use super::select;
use super::{Session, SessionConfig, SessionError, SessionFactory};

pub struct HttpSession {
    client: reqwest::Client,
    config: SessionConfig,
    current_url: Option<String>,
    body: String,
}

impl HttpSession {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.navigation_timeout)
            .build()
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        Ok(Self {
            client,
            config,
            current_url: None,
            body: String::new(),
        })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SessionError::Timeout {
                    url: url.to_string(),
                    ms: self.config.navigation_timeout.as_millis() as u64,
                }
            } else {
                SessionError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        self.body = response.text().await.map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.current_url = Some(url.to_string());
        debug!("Fetched {} ({} bytes)", url, self.body.len());
        Ok(())
    }

    async fn extract_text(&self, selector: &str) -> Option<String> {
        select::first_text(&self.body, selector)
    }

    async fn extract_attribute(&self, selector: &str, attr: &str) -> Option<String> {
        select::first_attribute(&self.body, selector, attr)
    }

    async fn extract_each_text(&self, selector: &str) -> Vec<String> {
        select::each_text(&self.body, selector)
    }

    async fn extract_each_attribute(&self, selector: &str, attr: &str) -> Vec<String> {
        select::each_attribute(&self.body, selector, attr)
    }

    async fn scroll_to_bottom(&mut self, _max_scrolls: u32) -> u32 {
        // Static HTML has nothing to lazy-load.
        0
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, SessionError> {
        Err(SessionError::Unsupported("screenshot over plain HTTP"))
    }

    async fn cleanup(&mut self) {
        self.body.clear();
        self.current_url = None;
    }
}

/// Factory producing one `HttpSession` per scrape run.
pub struct HttpSessionFactory {
    config: SessionConfig,
}

impl HttpSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        Ok(Box::new(HttpSession::new(self.config.clone())?))
    }
}
