//! Per-row discovery passes that enrich catalog rows before downloading:
//! part status, listing page counts, and supplier codes.
//!
//! The browser-backed passes run through [`RequeueScheduler`], so a row
//! whose page did not render in time goes to the back of the line instead
//! of blocking the rest. The supplier-code pass is plain HTTP and fans out
//! through [`ParallelDispatcher`].

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatch::ParallelDispatcher;
use crate::models::{CatalogRow, PartStatus, Supplier};
use crate::queue::{DrainReport, Outcome, RequeueScheduler, WorkItem};
use crate::scrapers::browser::{
    BrowserDriver, BrowserElement, BrowserError, BrowserSession, Locator, SessionMode,
};
use crate::scrapers::{extract, PageFetcher};
use crate::services::LISTING_PAGE_SIZE;

/// Tuning for the browser-backed discovery passes.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub page_load_timeout: Duration,
    /// Per-row attempt cap; `None` retries until the row resolves.
    pub max_attempts: Option<u32>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(60),
            max_attempts: Some(10),
        }
    }
}

/// One row probe queued for a discovery pass.
#[derive(Debug, Clone)]
pub struct RowProbe {
    /// Index into the caller's row slice, for writing results back.
    index: usize,
    url: String,
}

impl WorkItem for RowProbe {
    fn key(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("malformed page: {0}")]
    Malformed(String),
}

impl ProbeError {
    /// Browser failures are worth retrying; a malformed page will not
    /// improve on a second visit.
    fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Browser(_))
    }
}

/// Runs the status and page-count passes against a browser driver.
pub struct DiscoveryService<D> {
    driver: D,
    config: DiscoveryConfig,
}

impl<D: BrowserDriver> DiscoveryService<D> {
    pub fn new(driver: D, config: DiscoveryConfig) -> Self {
        Self { driver, config }
    }

    /// Fill `num_page` for every row by reading the matching-records count
    /// off each sub-group listing. Rows whose probe is abandoned keep
    /// `num_page == 0`.
    pub async fn fill_page_counts(&self, rows: &mut [CatalogRow]) -> DrainReport<RowProbe> {
        let probes = rows.iter().enumerate().map(|(index, row)| RowProbe {
            index,
            url: row.spg_url.clone(),
        });
        let found: Mutex<Vec<(usize, u32)>> = Mutex::new(Vec::new());

        let report = self
            .scheduler(probes)
            .drain(|probe| {
                let found = &found;
                async move {
                    match self.probe_page_count(&probe.url).await {
                        Ok(pages) => {
                            debug!(url = %probe.url, pages, "resolved page count");
                            lock(found).push((probe.index, pages));
                            Outcome::Done
                        }
                        Err(e) if e.is_transient() => Outcome::Transient(e.to_string()),
                        Err(e) => Outcome::Permanent(e.to_string()),
                    }
                }
            })
            .await;

        for (index, pages) in lock(&found).drain(..) {
            rows[index].num_page = pages;
        }
        info!(
            resolved = report.completed.len(),
            abandoned = report.abandoned.len(),
            requeues = report.requeues,
            "page-count pass finished"
        );
        report
    }

    /// Fill `part-status` for every row that has a supplier code, by
    /// visiting the supplier-scoped sub-group page. Rows without a code
    /// are skipped and keep their current status.
    pub async fn fill_statuses(&self, rows: &mut [CatalogRow]) -> DrainReport<RowProbe> {
        let probes: Vec<RowProbe> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let code = row.supplier_code.as_deref()?;
                Some(RowProbe {
                    index,
                    url: format!("{}?v={}", row.spg_url, code),
                })
            })
            .collect();
        let found: Mutex<Vec<(usize, PartStatus)>> = Mutex::new(Vec::new());

        let report = self
            .scheduler(probes)
            .drain(|probe| {
                let found = &found;
                async move {
                    match self.probe_status(&probe.url).await {
                        Ok(status) => {
                            debug!(url = %probe.url, status = status.as_str(), "resolved status");
                            lock(found).push((probe.index, status));
                            Outcome::Done
                        }
                        Err(e) if e.is_transient() => Outcome::Transient(e.to_string()),
                        Err(e) => Outcome::Permanent(e.to_string()),
                    }
                }
            })
            .await;

        for (index, status) in lock(&found).drain(..) {
            rows[index].status = status;
        }
        info!(
            resolved = report.completed.len(),
            abandoned = report.abandoned.len(),
            requeues = report.requeues,
            "status pass finished"
        );
        report
    }

    fn scheduler(&self, probes: impl IntoIterator<Item = RowProbe>) -> RequeueScheduler<RowProbe> {
        let scheduler = RequeueScheduler::new(probes);
        match self.config.max_attempts {
            Some(cap) => scheduler.with_max_attempts(cap),
            None => scheduler,
        }
    }

    /// One page-count probe attempt: open a session, navigate, read,
    /// close. The session is closed on the failure path too, so an
    /// abandoned probe never leaks a browser process.
    async fn probe_page_count(&self, url: &str) -> Result<u32, ProbeError> {
        let mut session = self.driver.open(SessionMode::Scrape).await?;
        let result = match session.navigate(url, self.config.page_load_timeout).await {
            Ok(()) => read_page_count(&mut session).await,
            Err(e) => Err(e.into()),
        };
        self.finish(url, session).await;
        result
    }

    async fn probe_status(&self, url: &str) -> Result<PartStatus, ProbeError> {
        let mut session = self.driver.open(SessionMode::Scrape).await?;
        let result = match session.navigate(url, self.config.page_load_timeout).await {
            Ok(()) => read_status(&mut session).await,
            Err(e) => Err(e.into()),
        };
        self.finish(url, session).await;
        result
    }

    async fn finish(&self, url: &str, session: D::Session) {
        if let Err(e) = session.close().await {
            warn!(%url, error = %e, "failed to close discovery session");
        }
    }
}

async fn read_page_count<S: BrowserSession>(session: &mut S) -> Result<u32, ProbeError> {
    let element = session.locate(&Locator::id("matching-records-count")).await?;
    let text = element.text().await?;
    let cleaned = text.replace(',', "");
    let count: u64 = cleaned
        .trim()
        .parse()
        .map_err(|_| ProbeError::Malformed(format!("unreadable record count {text:?}")))?;
    Ok(count.div_ceil(u64::from(LISTING_PAGE_SIZE)) as u32)
}

async fn read_status<S: BrowserSession>(session: &mut S) -> Result<PartStatus, ProbeError> {
    let element = match session.locate(&Locator::id("part-status")).await {
        Ok(element) => element,
        // Some layouts render the status inline in the attribute table
        // instead of the labelled element.
        Err(BrowserError::ElementNotFound(_)) => {
            session
                .locate(&Locator::cell_contains(
                    "#prod-att-table",
                    ["Obsolete", "Active"],
                ))
                .await?
        }
        Err(e) => return Err(e.into()),
    };
    let text = element.text().await?;
    PartStatus::parse_label(&text)
        .ok_or_else(|| ProbeError::Malformed(format!("unrecognized part status {text:?}")))
}

/// Backfill missing supplier codes by scraping each supplier-center page
/// over plain HTTP. Returns the indices of suppliers that gained a code.
pub async fn fill_supplier_codes(
    fetcher: &PageFetcher,
    dispatcher: &ParallelDispatcher,
    suppliers: &mut [Supplier],
) -> Vec<usize> {
    let pending: Vec<(usize, String)> = suppliers
        .iter()
        .enumerate()
        .filter(|(_, s)| s.supplier_code.is_none())
        .map(|(index, s)| (index, s.supplier_url.clone()))
        .collect();

    let results = dispatcher
        .run(
            pending,
            fetcher.clone(),
            |fetcher, (index, url)| async move {
                match fetcher.fetch(&url).await {
                    Ok(page) if page.is_success() => {
                        let code = extract::supplier_code(&page);
                        if code.is_none() {
                            info!(%url, "supplier page carries no code");
                        }
                        (index, code)
                    }
                    Ok(page) => {
                        warn!(%url, status = %page.status, "supplier page fetch rejected");
                        (index, None)
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "supplier page fetch failed");
                        (index, None)
                    }
                }
            },
        )
        .await;

    let mut filled = Vec::new();
    for (index, code) in results {
        if let Some(code) = code {
            suppliers[index].supplier_code = Some(code);
            filled.push(index);
        }
    }
    filled.sort_unstable();
    filled
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartStatus;
    use crate::scrapers::browser::fake::FakeDriver;

    fn row(spg_id: i64, spg_url: &str, code: Option<&str>) -> CatalogRow {
        CatalogRow {
            spg_id,
            pg_url_key: "connectors".into(),
            spg_url: spg_url.into(),
            spg_url_key: "usb".into(),
            supplier_code: code.map(str::to_string),
            num_page: 0,
            status: PartStatus::Active,
        }
    }

    fn service(driver: FakeDriver) -> DiscoveryService<FakeDriver> {
        DiscoveryService::new(
            driver,
            DiscoveryConfig {
                page_load_timeout: Duration::from_millis(10),
                max_attempts: Some(10),
            },
        )
    }

    #[tokio::test]
    async fn page_count_rounds_up_to_full_pages() {
        let driver = FakeDriver::new()
            .with_text(&Locator::id("matching-records-count"), "1,234");
        let mut rows = vec![row(10, "https://example.com/c/usb/10", None)];

        let report = service(driver.clone()).fill_page_counts(&mut rows).await;

        // 1234 records at 500 per page is 3 pages.
        assert_eq!(rows[0].num_page, 3);
        assert_eq!(report.completed.len(), 1);
        assert!(report.abandoned.is_empty());
        assert_eq!(driver.opens(), driver.closes());
    }

    #[tokio::test]
    async fn unreadable_count_is_permanent() {
        let driver = FakeDriver::new()
            .with_text(&Locator::id("matching-records-count"), "soon");
        let mut rows = vec![row(10, "https://example.com/c/usb/10", None)];

        let report = service(driver.clone()).fill_page_counts(&mut rows).await;

        assert_eq!(rows[0].num_page, 0);
        assert_eq!(report.abandoned.len(), 1);
        assert_eq!(report.abandoned[0].attempts, 1);
        assert_eq!(report.requeues, 0);
        assert_eq!(driver.opens(), driver.closes());
    }

    #[tokio::test]
    async fn missing_element_requeues_until_it_appears() {
        let driver = FakeDriver::new()
            .fail_locates(2)
            .with_text(&Locator::id("matching-records-count"), "500");
        let mut rows = vec![row(10, "https://example.com/c/usb/10", None)];

        let report = service(driver.clone()).fill_page_counts(&mut rows).await;

        assert_eq!(rows[0].num_page, 1);
        assert_eq!(report.requeues, 2);
        assert_eq!(driver.opens(), 3);
        assert_eq!(driver.closes(), 3);
    }

    #[tokio::test]
    async fn status_pass_visits_supplier_scoped_url() {
        let driver = FakeDriver::new().with_text(&Locator::id("part-status"), "Obsolete");
        let mut rows = vec![row(10, "https://example.com/c/usb/10", Some("1q"))];

        service(driver.clone()).fill_statuses(&mut rows).await;

        assert_eq!(rows[0].status, PartStatus::Obsolete);
        assert_eq!(
            driver.navigations(),
            vec!["https://example.com/c/usb/10?v=1q".to_string()]
        );
    }

    #[tokio::test]
    async fn status_pass_falls_back_to_attribute_table() {
        let driver = FakeDriver::new().with_text(
            &Locator::cell_contains("#prod-att-table", ["Obsolete", "Active"]),
            "  Obsolete  ",
        );
        let mut rows = vec![row(10, "https://example.com/c/usb/10", Some("1q"))];

        service(driver.clone()).fill_statuses(&mut rows).await;

        assert_eq!(rows[0].status, PartStatus::Obsolete);
        assert_eq!(driver.opens(), driver.closes());
    }

    #[tokio::test]
    async fn rows_without_code_are_skipped_by_status_pass() {
        let driver = FakeDriver::new();
        let mut rows = vec![row(10, "https://example.com/c/usb/10", None)];

        let report = service(driver.clone()).fill_statuses(&mut rows).await;

        assert_eq!(report.terminal_count(), 0);
        assert_eq!(driver.opens(), 0);
        assert_eq!(rows[0].status, PartStatus::Active);
    }
}
