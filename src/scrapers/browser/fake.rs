//! Scripted in-memory browser for exercising the pipelines without Chrome.
//!
//! Tests script failures (launch crashes, slow pages, missing elements)
//! and inspect the call log afterwards: opens vs. closes, navigated URLs,
//! clicked locators, and the download directories sessions were bound to.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserDriver, BrowserElement, BrowserError, BrowserSession, Locator, SessionMode};

#[derive(Debug, Default)]
struct Script {
    /// Number of upcoming `open` calls that fail with a session error.
    open_failures: u32,
    /// Number of upcoming `navigate` calls that fail with a timeout.
    navigate_failures: u32,
    /// Number of upcoming `locate` calls that fail with `ElementNotFound`.
    locate_failures: u32,
    /// Elements that exist on the fake page, keyed by locator display.
    elements: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct CallLog {
    opens: u32,
    closes: u32,
    navigations: Vec<String>,
    clicks: Vec<String>,
    download_dirs: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct State {
    script: Script,
    log: CallLog,
}

/// Shared-state fake implementing [`BrowserDriver`].
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` session opens.
    pub fn fail_opens(self, n: u32) -> Self {
        self.state_mut().script.open_failures = n;
        self
    }

    /// Fail the next `n` navigations.
    pub fn fail_navigations(self, n: u32) -> Self {
        self.state_mut().script.navigate_failures = n;
        self
    }

    /// Fail the next `n` locate calls.
    pub fn fail_locates(self, n: u32) -> Self {
        self.state_mut().script.locate_failures = n;
        self
    }

    /// Register an element with visible text.
    pub fn with_text(self, locator: &Locator, text: &str) -> Self {
        self.state_mut()
            .script
            .elements
            .insert(locator.to_string(), text.to_string());
        self
    }

    /// Register an element without caring about its text (click targets).
    pub fn with_element(self, locator: &Locator) -> Self {
        self.with_text(locator, "")
    }

    pub fn opens(&self) -> u32 {
        self.state_mut().log.opens
    }

    pub fn closes(&self) -> u32 {
        self.state_mut().log.closes
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state_mut().log.navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state_mut().log.clicks.clone()
    }

    pub fn download_dirs(&self) -> Vec<PathBuf> {
        self.state_mut().log.download_dirs.clone()
    }

    fn state_mut(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    async fn open(&self, mode: SessionMode) -> Result<FakeSession, BrowserError> {
        let mut state = self.state_mut();
        state.log.opens += 1;
        if state.script.open_failures > 0 {
            state.script.open_failures -= 1;
            return Err(BrowserError::Session("scripted launch failure".into()));
        }
        if let SessionMode::Download(ref dir) = mode {
            state.log.download_dirs.push(dir.clone());
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeSession {
    state: Arc<Mutex<State>>,
}

impl FakeSession {
    fn state_mut(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state_mut();
        state.log.navigations.push(url.to_string());
        if state.script.navigate_failures > 0 {
            state.script.navigate_failures -= 1;
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "scripted navigation timeout".into(),
            });
        }
        Ok(())
    }

    async fn locate(&mut self, locator: &Locator) -> Result<FakeElement, BrowserError> {
        let key = locator.to_string();
        let mut state = self.state_mut();
        if state.script.locate_failures > 0 {
            state.script.locate_failures -= 1;
            return Err(BrowserError::ElementNotFound(key));
        }
        match state.script.elements.get(&key) {
            Some(text) => Ok(FakeElement {
                state: Arc::clone(&self.state),
                key,
                text: text.clone(),
            }),
            None => Err(BrowserError::ElementNotFound(key)),
        }
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.state_mut().log.closes += 1;
        Ok(())
    }
}

pub struct FakeElement {
    state: Arc<Mutex<State>>,
    key: String,
    text: String,
}

#[async_trait]
impl BrowserElement for FakeElement {
    async fn text(&self) -> Result<String, BrowserError> {
        Ok(self.text.clone())
    }

    async fn click(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.log.clicks.push(self.key.clone());
        Ok(())
    }
}
