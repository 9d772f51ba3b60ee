// =============================================================================
// render/chromium.rs — ONE BROWSER, ONE TAB
// =============================================================================
//
// Headless Chromium via chromiumoxide. The tab is opened once and reused for
// every navigation in a run. Element waits run a small XPath script in the
// page every 250ms until the node exists, has a layout box, is not hidden
// and carries non-empty text.
// =============================================================================

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PageRenderer;
use crate::config::Config;
use crate::error::{RateError, RateResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Candidate binaries tried when no explicit executable is configured.
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
];

pub struct ChromiumRenderer {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumRenderer {
    /// Launch a browser and open the single tab the run will use.
    pub async fn launch(config: &Config) -> RateResult<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if let Some(path) = find_chrome(config) {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| RateError::Config(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RateError::Fetch(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Chromium handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RateError::Fetch(format!("failed to open a tab: {e}")))?;

        info!(headless = config.headless, "Chromium session started");

        Ok(Self {
            browser,
            page,
            handler,
            navigation_timeout: config.render_timeout,
        })
    }

    async fn read_visible_text(&self, xpath: &str) -> RateResult<String> {
        let script = visible_text_script(xpath)?;
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| RateError::Fetch(format!("reading {xpath} failed: {e}")))?;
        result
            .into_value::<String>()
            .map_err(|e| RateError::parse(format!("reading {xpath} returned garbage: {e}")))
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn navigate(&mut self, url: &str) -> RateResult<()> {
        let started = Instant::now();
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                debug!(url = url, elapsed_ms = started.elapsed().as_millis() as u64, "Navigated");
                Ok(())
            }
            Ok(Err(e)) => Err(RateError::Fetch(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(RateError::Timeout {
                locator: url.to_string(),
                seconds: self.navigation_timeout.as_secs(),
            }),
        }
    }

    async fn wait_for_text(&mut self, xpath: &str, timeout: Duration) -> RateResult<String> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.read_visible_text(xpath).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => {}
                Err(e) => debug!(xpath = xpath, error = %e, "Element read failed, polling again"),
            }
            if Instant::now() >= deadline {
                return Err(RateError::Timeout {
                    locator: xpath.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn shutdown(&mut self) -> RateResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Chromium did not close cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("Chromium session closed");
        Ok(())
    }
}

/// JavaScript that returns the element's text when it is visible, else "".
fn visible_text_script(xpath: &str) -> RateResult<String> {
    let literal = serde_json::to_string(xpath)
        .map_err(|e| RateError::parse(format!("cannot quote xpath {xpath}: {e}")))?;
    Ok(format!(
        r#"(() => {{
    const el = document.evaluate({literal}, document, null,
        XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    if (!el) return "";
    const style = window.getComputedStyle(el);
    if (style.display === "none" || style.visibility === "hidden") return "";
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 && rect.height === 0) return "";
    return el.innerText || el.textContent || "";
}})()"#
    ))
}

fn find_chrome(config: &Config) -> Option<PathBuf> {
    if let Some(path) = &config.chrome_executable {
        return Some(path.clone());
    }
    CHROME_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
