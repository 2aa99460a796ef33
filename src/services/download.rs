//! Bulk page-export downloads.
//!
//! Each work-table row expands into one item per listing page; each item
//! drives its own browser session bound to the destination directory,
//! navigates to the page and clicks the export trigger. Two independent
//! budgets bound the work: launch failures burn the session budget, and
//! the one session that comes up gets a bounded number of export
//! attempts. Exhausting either budget abandons the item into the final
//! report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchMode, ParallelDispatcher};
use crate::models::CatalogRow;
use crate::paths::CatalogPathResolver;
use crate::queue::WorkItem;
use crate::scrapers::browser::{
    BrowserDriver, BrowserElement, BrowserError, BrowserSession, Locator, SessionMode,
};
use crate::services::LISTING_PAGE_SIZE;

/// Export control on a listing page.
const DOWNLOAD_TRIGGER: &str =
    "#content div.mid-wrapper div.dload-btn form.download-table input.button";

/// Tuning for the download pipeline.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Root of the on-disk download tree.
    pub index_dir: PathBuf,
    /// Browser launches tried per item before giving up.
    pub max_session_attempts: u32,
    /// Navigate-and-click attempts tried within one session.
    pub max_action_attempts: u32,
    pub page_load_timeout: Duration,
    /// Grace period after the click, so the export finishes writing
    /// before the session is torn down.
    pub settle_delay: Duration,
    pub workers: usize,
    pub mode: DispatchMode,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("."),
            max_session_attempts: 5,
            max_action_attempts: 15,
            page_load_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(6),
            workers: 4,
            mode: DispatchMode::Thread,
        }
    }
}

/// One listing page to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub url: String,
    pub page: u32,
    pub pg_url_key: String,
    pub spg_url_key: String,
}

impl WorkItem for PageItem {
    fn key(&self) -> String {
        self.url.clone()
    }
}

/// Expand work-table rows into per-page download items.
///
/// Inactive rows are dropped; a row with `num_page == 0` contributes
/// nothing.
pub fn expand(rows: &[CatalogRow]) -> Vec<PageItem> {
    rows.iter()
        .filter(|row| row.is_active())
        .flat_map(|row| {
            (1..=row.num_page).map(move |page| PageItem {
                url: format!(
                    "{}?&page={}&pageSize={}",
                    row.spg_url, page, LISTING_PAGE_SIZE
                ),
                page,
                pg_url_key: row.pg_url_key.clone(),
                spg_url_key: row.spg_url_key.clone(),
            })
        })
        .collect()
}

/// Progress events emitted while the pipeline runs.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started { url: String },
    Completed { url: String },
    Failed { url: String, reason: String },
}

/// A page that exhausted a retry budget.
#[derive(Debug, Clone)]
pub struct FailedPage {
    pub url: String,
    /// Attempts consumed by the budget that ran out: session launches if
    /// no browser ever came up, export actions otherwise.
    pub attempts: u32,
    pub reason: String,
}

/// Terminal accounting for one pipeline run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub failed: Vec<FailedPage>,
}

impl DownloadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct DownloadCtx<D> {
    driver: Arc<D>,
    resolver: CatalogPathResolver,
    config: DownloadConfig,
    events: mpsc::Sender<DownloadEvent>,
}

impl<D> Clone for DownloadCtx<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }
}

/// Drives the download pipeline against a browser driver.
pub struct DownloadService<D> {
    driver: Arc<D>,
    config: DownloadConfig,
}

impl<D> DownloadService<D>
where
    D: BrowserDriver + 'static,
    D::Session: 'static,
{
    pub fn new(driver: D, config: DownloadConfig) -> Self {
        Self {
            driver: Arc::new(driver),
            config,
        }
    }

    /// Download every page named by the work table. Progress is reported
    /// on `events`; the returned report lists every abandoned page.
    pub async fn download_all(
        &self,
        rows: &[CatalogRow],
        events: mpsc::Sender<DownloadEvent>,
    ) -> DownloadReport {
        let items = expand(rows);
        info!(
            pages = items.len(),
            workers = self.config.workers,
            mode = ?self.config.mode,
            "starting download run"
        );

        let dispatcher = ParallelDispatcher::new(self.config.workers, self.config.mode);
        let ctx = DownloadCtx {
            driver: Arc::clone(&self.driver),
            resolver: CatalogPathResolver::new(self.config.index_dir.clone()),
            config: self.config.clone(),
            events,
        };

        let outcomes = dispatcher
            .run(items, ctx, |ctx, item| async move {
                let _ = ctx
                    .events
                    .send(DownloadEvent::Started {
                        url: item.url.clone(),
                    })
                    .await;
                let outcome = download_page(&ctx, &item).await;
                let event = match &outcome {
                    Ok(()) => DownloadEvent::Completed {
                        url: item.url.clone(),
                    },
                    Err(failure) => DownloadEvent::Failed {
                        url: failure.url.clone(),
                        reason: failure.reason.clone(),
                    },
                };
                let _ = ctx.events.send(event).await;
                outcome
            })
            .await;

        let mut report = DownloadReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(()) => report.downloaded += 1,
                Err(failure) => report.failed.push(failure),
            }
        }
        info!(
            downloaded = report.downloaded,
            failed = report.failed.len(),
            "download run finished"
        );
        report
    }
}

/// Download one listing page.
///
/// The session budget covers browser launches only. Once a session is
/// up it gets the full action budget exactly once; exhausting it is the
/// item's terminal failure, never grounds for another launch.
async fn download_page<D>(ctx: &DownloadCtx<D>, item: &PageItem) -> Result<(), FailedPage>
where
    D: BrowserDriver,
{
    let dest = ctx
        .resolver
        .resolve(&item.pg_url_key, &item.spg_url_key, item.page);
    if let Err(e) = tokio::fs::create_dir_all(&dest).await {
        return Err(FailedPage {
            url: item.url.clone(),
            attempts: 0,
            reason: format!("cannot create {}: {e}", dest.display()),
        });
    }

    let mut session = None;
    let mut last_reason = String::new();
    for launch_attempt in 1..=ctx.config.max_session_attempts {
        match ctx.driver.open(SessionMode::Download(dest.clone())).await {
            Ok(opened) => {
                session = Some(opened);
                break;
            }
            Err(e) => {
                warn!(url = %item.url, launch_attempt, error = %e, "session launch failed");
                last_reason = e.to_string();
            }
        }
    }
    let Some(session) = session else {
        return Err(FailedPage {
            url: item.url.clone(),
            attempts: ctx.config.max_session_attempts,
            reason: last_reason,
        });
    };

    match trigger_export(session, ctx, item).await {
        Ok(()) => {
            debug!(url = %item.url, dest = %dest.display(), "page exported");
            Ok(())
        }
        Err(reason) => {
            warn!(url = %item.url, %reason, "export budget exhausted");
            Err(FailedPage {
                url: item.url.clone(),
                attempts: ctx.config.max_action_attempts,
                reason,
            })
        }
    }
}

/// Drive one session through the action budget: navigate, find the export
/// trigger, click, wait for the export to settle. The session is closed
/// on every exit path.
async fn trigger_export<D>(
    mut session: D::Session,
    ctx: &DownloadCtx<D>,
    item: &PageItem,
) -> Result<(), String>
where
    D: BrowserDriver,
{
    let mut last_reason = String::new();
    let mut clicked = false;

    for _ in 1..=ctx.config.max_action_attempts {
        match export_once(&mut session, ctx, item).await {
            Ok(()) => {
                clicked = true;
                break;
            }
            Err(e) => last_reason = e.to_string(),
        }
    }

    if clicked {
        // Give the browser time to finish writing the export file before
        // the instance goes away.
        tokio::time::sleep(ctx.config.settle_delay).await;
    }
    if let Err(e) = session.close().await {
        warn!(url = %item.url, error = %e, "failed to close download session");
    }

    if clicked {
        Ok(())
    } else {
        Err(last_reason)
    }
}

async fn export_once<D>(
    session: &mut D::Session,
    ctx: &DownloadCtx<D>,
    item: &PageItem,
) -> Result<(), BrowserError>
where
    D: BrowserDriver,
{
    session
        .navigate(&item.url, ctx.config.page_load_timeout)
        .await?;
    let trigger = session.locate(&Locator::css(DOWNLOAD_TRIGGER)).await?;
    trigger.click().await
}
