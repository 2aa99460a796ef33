//! End-to-end pipeline tests against the scripted browser fake: discovery
//! fills the work table, download expands it into per-page exports, and
//! every opened session is closed again.

use std::time::Duration;

use tokio::sync::mpsc;

use partdex::dispatch::DispatchMode;
use partdex::models::{CatalogRow, PartStatus};
use partdex::scrapers::browser::fake::FakeDriver;
use partdex::scrapers::browser::Locator;
use partdex::services::{
    expand, DiscoveryConfig, DiscoveryService, DownloadConfig, DownloadService,
};
use partdex::workbook;

const DOWNLOAD_TRIGGER: &str =
    "#content div.mid-wrapper div.dload-btn form.download-table input.button";

fn work_row() -> CatalogRow {
    CatalogRow {
        spg_id: 42,
        pg_url_key: "connectors".into(),
        spg_url: "https://example.com/products/connectors/usb/42".into(),
        spg_url_key: "usb".into(),
        supplier_code: Some("1q".into()),
        num_page: 0,
        status: PartStatus::Active,
    }
}

fn discovery_config() -> DiscoveryConfig {
    DiscoveryConfig {
        page_load_timeout: Duration::from_millis(10),
        max_attempts: Some(5),
    }
}

fn download_config(index_dir: std::path::PathBuf) -> DownloadConfig {
    DownloadConfig {
        index_dir,
        settle_delay: Duration::ZERO,
        page_load_timeout: Duration::from_millis(10),
        workers: 2,
        mode: DispatchMode::Thread,
        ..DownloadConfig::default()
    }
}

fn sink() -> mpsc::Sender<partdex::services::DownloadEvent> {
    mpsc::channel(64).0
}

#[tokio::test]
async fn discovery_then_download_walks_the_whole_table() {
    let tmp = tempfile::tempdir().expect("tempdir");

    // Discovery: the site reports 750 matching records, so two pages.
    let driver = FakeDriver::new()
        .with_text(&Locator::id("part-status"), "Active")
        .with_text(&Locator::id("matching-records-count"), "750");
    let discovery = DiscoveryService::new(driver.clone(), discovery_config());

    let mut rows = vec![work_row()];
    discovery.fill_statuses(&mut rows).await;
    let report = discovery.fill_page_counts(&mut rows).await;
    assert!(report.abandoned.is_empty());
    assert_eq!(rows[0].num_page, 2);
    assert!(rows[0].is_active());

    // The work table round-trips through CSV between the two phases.
    let table_path = tmp.path().join("dl_spg.csv");
    workbook::write_work_table(&table_path, &rows).expect("write work table");
    let rows = workbook::read_work_table(&table_path).expect("read work table");

    // Download: both pages land in the same batch directory.
    let driver = FakeDriver::new().with_element(&Locator::css(DOWNLOAD_TRIGGER));
    let index_dir = tmp.path().join("index");
    let service = DownloadService::new(driver.clone(), download_config(index_dir.clone()));
    let report = service.download_all(&rows, sink()).await;

    assert_eq!(report.downloaded, 2);
    assert!(report.is_clean());

    let expected = index_dir.join("connectors").join("usb").join("batch_1");
    assert_eq!(driver.download_dirs(), vec![expected.clone(), expected.clone()]);
    assert!(expected.is_dir());

    let items = expand(&rows);
    let urls: Vec<&str> = items.iter().map(|item| item.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/products/connectors/usb/42?&page=1&pageSize=500",
            "https://example.com/products/connectors/usb/42?&page=2&pageSize=500",
        ]
    );

    assert_eq!(driver.opens(), driver.closes());
}

#[tokio::test]
async fn obsolete_rows_never_reach_the_downloader() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let driver = FakeDriver::new()
        .with_text(&Locator::id("part-status"), "Obsolete")
        .with_text(&Locator::id("matching-records-count"), "750");
    let discovery = DiscoveryService::new(driver.clone(), discovery_config());

    let mut rows = vec![work_row()];
    discovery.fill_statuses(&mut rows).await;
    discovery.fill_page_counts(&mut rows).await;
    assert_eq!(rows[0].status, PartStatus::Obsolete);

    let downloader = FakeDriver::new().with_element(&Locator::css(DOWNLOAD_TRIGGER));
    let service = DownloadService::new(downloader.clone(), download_config(tmp.path().into()));
    let report = service.download_all(&rows, sink()).await;

    assert_eq!(report.downloaded, 0);
    assert!(report.is_clean());
    assert_eq!(downloader.opens(), 0);
}

#[tokio::test]
async fn abandoned_pages_surface_in_the_final_report() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let mut rows = vec![work_row()];
    rows[0].num_page = 1;

    // Every launch fails, so the item burns its whole session budget.
    let driver = FakeDriver::new().fail_opens(100);
    let service = DownloadService::new(driver.clone(), download_config(tmp.path().into()));
    let report = service.download_all(&rows, sink()).await;

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed.len(), 1);
    let failure = &report.failed[0];
    assert_eq!(failure.attempts, 5);
    assert!(failure.url.contains("page=1"));
    assert_eq!(driver.opens(), 5);
    assert_eq!(driver.closes(), 0);
}

#[tokio::test]
async fn discovery_survives_a_flaky_site() {
    // First two probes hit a page that never rendered; the row is retried
    // from the back of the queue and resolves on the third session.
    let driver = FakeDriver::new()
        .fail_navigations(2)
        .with_text(&Locator::id("matching-records-count"), "499");
    let discovery = DiscoveryService::new(driver.clone(), discovery_config());

    let mut rows = vec![work_row()];
    let report = discovery.fill_page_counts(&mut rows).await;

    assert_eq!(rows[0].num_page, 1);
    assert_eq!(report.requeues, 2);
    assert_eq!(driver.opens(), 3);
    assert_eq!(driver.closes(), 3);
}
