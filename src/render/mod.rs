// =============================================================================
// render/mod.rs — HOW WE LOOK AT A PAGE
// =============================================================================
//
// Two ways in, two traits:
//
//   PageFetcher   plain HTTP GET, returns the HTML body. Deposit tables are
//                 server-rendered, so this is all they need.
//
//   PageRenderer  a stateful browser tab. Navigate somewhere, then wait until
//                 an element (by XPath) is visible and read its text. Loan
//                 quotes only exist after the site's JavaScript has run.
//
// The pipeline owns exactly one renderer for the whole run and drives it
// strictly in sequence; `&mut self` on every renderer call keeps it that way.
// =============================================================================

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{RateError, RateResult};

pub use chromium::ChromiumRenderer;

/// Fetch a page's HTML over plain HTTP.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> RateResult<String>;
}

/// A single browser tab the extractors can steer.
#[async_trait]
pub trait PageRenderer: Send {
    /// Load `url` in the tab, replacing whatever was there.
    async fn navigate(&mut self, url: &str) -> RateResult<()>;

    /// Wait until the element at `xpath` is visible and return its text.
    /// Fails with `RateError::Timeout` once `timeout` has elapsed.
    async fn wait_for_text(&mut self, xpath: &str, timeout: Duration) -> RateResult<String>;

    /// Release the browser. Called once at the end of a run.
    async fn shutdown(&mut self) -> RateResult<()> {
        Ok(())
    }
}

/// reqwest-backed fetcher for server-rendered pages.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> RateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RateError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RateResult<String> {
        debug!(url = url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Fetch(format!("{url} answered {status}")));
        }
        Ok(response.text().await?)
    }
}
