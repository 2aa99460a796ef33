//! Browser-automation capability.
//!
//! The discovery and download pipelines only depend on the traits below,
//! so the core logic runs against [`fake::FakeDriver`] in tests without a
//! real browser. The chromiumoxide-backed [`CdpDriver`] is the production
//! implementation.

pub mod fake;

#[cfg(feature = "browser")]
mod cdp;
#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// How a session is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Headless scraping, no download side effects.
    Scrape,
    /// Download mode: the given directory is baked into the instance as
    /// its download destination. One destination per session - a new
    /// session is required for a different directory.
    Download(PathBuf),
}

/// Element selection strategies the pipelines need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element id, e.g. the `part-status` label.
    Id(String),
    /// CSS selector, e.g. the download-trigger control.
    Css(String),
    /// First `td` under `table` whose text contains one of `needles`.
    /// Fallback for pages that render the status inline in the
    /// attribute table instead of the labelled element.
    CellContains {
        table: String,
        needles: Vec<String>,
    },
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn cell_contains(
        table: impl Into<String>,
        needles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Locator::CellContains {
            table: table.into(),
            needles: needles.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{id}"),
            Locator::Css(css) => write!(f, "{css}"),
            Locator::CellContains { table, needles } => {
                write!(f, "{table} td containing {needles:?}")
            }
        }
    }
}

/// Failure taxonomy for browser work.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The browser instance could not be launched or crashed.
    #[error("browser session failed: {0}")]
    Session(String),
    /// Navigation timed out or the driver gave up on the page.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    /// The element did not appear within the implicit-wait window.
    #[error("element not found: {0}")]
    ElementNotFound(String),
    /// The DOM mutated between locating the element and acting on it.
    #[error("stale element: {0}")]
    StaleElement(String),
}

/// Launches browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Session: BrowserSession;

    async fn open(&self, mode: SessionMode) -> Result<Self::Session, BrowserError>;
}

/// One browser instance lifecycle: navigate, locate, close.
///
/// `close` must be called exactly once per opened session, on every exit
/// path - a leaked instance accumulates an orphaned OS process and temp
/// profile across thousands of work items.
#[async_trait]
pub trait BrowserSession: Send {
    type Element: BrowserElement;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn locate(&mut self, locator: &Locator) -> Result<Self::Element, BrowserError>;

    async fn close(self) -> Result<(), BrowserError>;
}

/// A located page element.
#[async_trait]
pub trait BrowserElement: Send {
    async fn text(&self) -> Result<String, BrowserError>;

    async fn click(&self) -> Result<(), BrowserError>;
}

/// Launch configuration shared by all sessions of a driver.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit browser binary; common install locations are probed when
    /// unset.
    pub browser_binary: Option<PathBuf>,
    /// How long `locate` polls for an element before reporting
    /// `ElementNotFound`.
    pub implicit_wait: Duration,
    /// Extra command-line arguments for the browser process.
    pub extra_args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            browser_binary: None,
            implicit_wait: Duration::from_secs(2),
            extra_args: Vec::new(),
        }
    }
}
