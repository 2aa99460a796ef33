//! HTTP fetcher with bounded connect retries and exponential backoff.

use std::time::Duration;

use reqwest::StatusCode;
use scraper::Html;
use tracing::{debug, warn};

/// Connection retry policy for plain HTTP scraping.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts before a connect/timeout failure becomes terminal.
    pub connect_retries: u32,
    /// Base delay; attempt `n` backs off `base * 2^(n-1)`.
    pub backoff_base: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_retries: 5,
            backoff_base: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            user_agent: "partdex/0.4".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempts: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A fetched page: status code plus raw body, parsed on demand.
///
/// The parsed document is not stored because `scraper::Html` is not
/// `Send`; callers parse after the response future has resolved.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// HTTP GET client for pages that render without JavaScript.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// GET a URL, retrying connect/timeout failures with exponential
    /// backoff. Non-2xx statuses are returned to the caller, not treated
    /// as errors.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await?;
                    debug!(%url, %status, "fetched page");
                    return Ok(FetchedPage { status, body });
                }
                Err(err)
                    if (err.is_connect() || err.is_timeout())
                        && attempt < self.config.connect_retries =>
                {
                    let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                    warn!(%url, attempt, ?delay, "connect failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = FetchConfig::default();
        let delays: Vec<Duration> = (1..=4)
            .map(|attempt| config.backoff_base * 2u32.pow(attempt - 1))
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[test]
    fn fetched_page_parses_body() {
        let page = FetchedPage {
            status: StatusCode::OK,
            body: "<html><body><p id='x'>hi</p></body></html>".to_string(),
        };
        let doc = page.document();
        let selector = scraper::Selector::parse("#x").expect("selector");
        let text: String = doc
            .select(&selector)
            .next()
            .expect("element")
            .text()
            .collect();
        assert_eq!(text, "hi");
    }
}
