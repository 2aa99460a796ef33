//! chromiumoxide (CDP) implementation of the browser capability.
//!
//! Every session launches its own Chrome process: download mode bakes one
//! destination directory into the instance, and a fresh process per work
//! item keeps driver state from leaking between downloads.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tracing::{debug, info};

use super::{BrowserDriver, BrowserElement, BrowserError, BrowserSession, Locator, SessionConfig, SessionMode};

/// How often `locate` re-polls for a missing element.
const LOCATE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Launches one headless Chrome per session via the DevTools protocol.
#[derive(Debug, Clone)]
pub struct CdpDriver {
    config: SessionConfig,
}

impl CdpDriver {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    fn locate_chrome(&self) -> Result<PathBuf, BrowserError> {
        if let Some(ref binary) = self.config.browser_binary {
            return Ok(binary.clone());
        }

        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(BrowserError::Session(
            "Chrome/Chromium not found; install it or set the browser binary path".into(),
        ))
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    type Session = CdpSession;

    async fn open(&self, mode: SessionMode) -> Result<CdpSession, BrowserError> {
        let chrome_path = self.locate_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.extra_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| BrowserError::Session(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Session(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Session(format!("failed to open page: {e}")))?;

        if let SessionMode::Download(ref dir) = mode {
            info!(dir = %dir.display(), "browser session bound to download directory");
            let params = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(dir.to_string_lossy().to_string())
                .build()
                .map_err(|e| BrowserError::Session(format!("invalid download behavior: {e}")))?;
            page.execute(params)
                .await
                .map_err(|e| BrowserError::Session(format!("failed to set download dir: {e}")))?;
        }

        Ok(CdpSession {
            browser,
            page,
            handler_task,
            implicit_wait: self.config.implicit_wait,
        })
    }
}

/// One live Chrome process with a single page.
pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    implicit_wait: Duration,
}

impl CdpSession {
    async fn try_locate(&self, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        match locator {
            Locator::Id(id) => Ok(self.page.find_element(format!("#{id}")).await.ok()),
            Locator::Css(css) => Ok(self.page.find_element(css.clone()).await.ok()),
            Locator::CellContains { table, needles } => {
                let cells = match self.page.find_elements(format!("{table} td")).await {
                    Ok(cells) => cells,
                    Err(_) => return Ok(None),
                };
                for cell in cells {
                    if let Ok(Some(text)) = cell.inner_text().await {
                        if needles.iter().any(|needle| text.contains(needle)) {
                            return Ok(Some(cell));
                        }
                    }
                }
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    type Element = CdpElement;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("page load timed out after {timeout:?}"),
            }),
        }
    }

    async fn locate(&mut self, locator: &Locator) -> Result<CdpElement, BrowserError> {
        let deadline = Instant::now() + self.implicit_wait;
        loop {
            if let Some(element) = self.try_locate(locator).await? {
                return Ok(CdpElement { inner: element });
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::ElementNotFound(locator.to_string()));
            }
            tokio::time::sleep(LOCATE_POLL_INTERVAL).await;
        }
    }

    async fn close(mut self) -> Result<(), BrowserError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Session(format!("failed to close browser: {e}")));
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        result
    }
}

pub struct CdpElement {
    inner: Element,
}

#[async_trait]
impl BrowserElement for CdpElement {
    async fn text(&self) -> Result<String, BrowserError> {
        let text = self
            .inner
            .inner_text()
            .await
            .map_err(|e| BrowserError::StaleElement(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    async fn click(&self) -> Result<(), BrowserError> {
        self.inner
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::StaleElement(e.to_string()))
    }
}
