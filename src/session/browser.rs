//! Headless-browser session backed by chromiumoxide (CDP).

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{Session, SessionConfig, SessionError, SessionFactory};

/// URL patterns never fetched when resource blocking is on.
const BLOCKED_RESOURCES: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico", "*.woff", "*.woff2",
    "*.ttf", "*.otf", "*.css",
];

/// Common Chrome executable locations.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

fn find_chrome() -> Result<std::path::PathBuf, SessionError> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    debug!("Found Chrome in PATH: {}", path);
                    return Ok(std::path::PathBuf::from(path));
                }
            }
        }
    }

    Err(SessionError::Launch(
        "Chrome/Chromium not found; install chromium or google-chrome".to_string(),
    ))
}

/// One headless Chrome context.
pub struct BrowserSession {
    config: SessionConfig,
    browser: Browser,
    page: Page,
}

impl BrowserSession {
    /// Launch a browser and open a blank page with the configured user agent,
    /// viewport and resource-blocking policy. Failure here is fatal to the
    /// scrape run and propagated.
    pub async fn launch(config: SessionConfig) -> Result<Self, SessionError> {
        let chrome_path = find_chrome()?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.viewport.0, config.viewport.1)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(SessionError::Launch)?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        page.set_user_agent(config.user_agent.as_str())
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        if config.block_resources {
            let urls = BLOCKED_RESOURCES.iter().map(|s| s.to_string()).collect();
            let setup = async {
                page.execute(EnableParams::default()).await?;
                page.execute(SetBlockedUrLsParams { urls }).await
            };
            setup
                .await
                .map_err(|e| SessionError::Launch(e.to_string()))?;
        }

        Ok(Self {
            config,
            browser,
            page,
        })
    }

    /// Wait briefly for a selector; None once the selector timeout passes.
    async fn wait_for_element(&self, selector: &str) -> Option<chromiumoxide::element::Element> {
        let deadline = tokio::time::Instant::now() + self.config.selector_timeout;
        loop {
            if let Ok(el) = self.page.find_element(selector).await {
                return Some(el);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("Selector '{}' not found within timeout", selector);
                return None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn page_height(&self) -> Option<i64> {
        self.page
            .evaluate("document.body.scrollHeight")
            .await
            .ok()?
            .into_value::<i64>()
            .ok()
    }
}

#[async_trait]
impl Session for BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.config.navigation_timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(SessionError::Timeout {
                url: url.to_string(),
                ms: self.config.navigation_timeout.as_millis() as u64,
            }),
        }
    }

    async fn extract_text(&self, selector: &str) -> Option<String> {
        let el = self.wait_for_element(selector).await?;
        let text = el.inner_text().await.ok().flatten()?;
        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn extract_attribute(&self, selector: &str, attr: &str) -> Option<String> {
        let el = self.wait_for_element(selector).await?;
        el.attribute(attr).await.ok().flatten()
    }

    async fn extract_each_text(&self, selector: &str) -> Vec<String> {
        if self.wait_for_element(selector).await.is_none() {
            return Vec::new();
        }
        let elements = match self.page.find_elements(selector).await {
            Ok(els) => els,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::with_capacity(elements.len());
        for el in elements {
            if let Ok(Some(text)) = el.inner_text().await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }
        out
    }

    async fn extract_each_attribute(&self, selector: &str, attr: &str) -> Vec<String> {
        if self.wait_for_element(selector).await.is_none() {
            return Vec::new();
        }
        let elements = match self.page.find_elements(selector).await {
            Ok(els) => els,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::with_capacity(elements.len());
        for el in elements {
            if let Ok(Some(value)) = el.attribute(attr).await {
                out.push(value);
            }
        }
        out
    }

    async fn scroll_to_bottom(&mut self, max_scrolls: u32) -> u32 {
        let mut last_height = match self.page_height().await {
            Some(h) => h,
            None => return 0,
        };

        let mut scrolls = 0;
        while scrolls < max_scrolls {
            if self
                .page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .is_err()
            {
                break;
            }
            scrolls += 1;
            // Give lazy-loaded content a moment to arrive.
            tokio::time::sleep(Duration::from_millis(800)).await;

            match self.page_height().await {
                Some(h) if h > last_height => last_height = h,
                _ => break,
            }
        }
        scrolls
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, SessionError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| SessionError::Navigation {
                url: "screenshot".to_string(),
                message: e.to_string(),
            })
    }

    async fn cleanup(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
    }
}

/// Factory producing one launched browser per scrape run.
pub struct BrowserSessionFactory {
    config: SessionConfig,
}

impl BrowserSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        Ok(Box::new(BrowserSession::launch(self.config.clone()).await?))
    }
}
