use std::path::Path;

use crate::config::Settings;

#[cfg(feature = "browser")]
pub async fn cmd_download(
    settings: &Settings,
    work_table: &Path,
    workers: usize,
    tasks: bool,
) -> anyhow::Result<()> {
    use console::style;
    use indicatif::{ProgressBar, ProgressStyle};
    use tokio::sync::mpsc;

    use crate::dispatch::DispatchMode;
    use crate::scrapers::browser::CdpDriver;
    use crate::services::{expand, DownloadEvent, DownloadService};
    use crate::workbook;

    let rows = workbook::read_work_table(work_table)?;
    let total = expand(&rows).len() as u64;
    if total == 0 {
        println!(
            "{} Work table names no downloadable pages",
            style("!").yellow()
        );
        return Ok(());
    }

    settings.ensure_directories()?;
    let mode = if tasks {
        DispatchMode::Task
    } else {
        DispatchMode::Thread
    };
    let mut config = settings.download_config(mode);
    config.workers = workers;

    println!(
        "{} Downloading {total} pages from {} sub-groups with {workers} workers",
        style("→").dim(),
        rows.len()
    );
    let service = DownloadService::new(CdpDriver::new(settings.session_config()), config);

    let (event_tx, mut event_rx) = mpsc::channel(100);
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let ui = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Started { url } => bar.set_message(url),
                DownloadEvent::Completed { .. } | DownloadEvent::Failed { .. } => bar.inc(1),
            }
        }
        bar.finish_and_clear();
    });

    let report = service.download_all(&rows, event_tx).await;
    let _ = ui.await;

    println!(
        "{} Downloaded {} pages into {}",
        style("✓").green(),
        report.downloaded,
        settings.index_dir.display()
    );
    if !report.is_clean() {
        println!(
            "{} {} pages abandoned:",
            style("!").yellow(),
            report.failed.len()
        );
        for failure in &report.failed {
            println!(
                "  {} after {} sessions: {}",
                failure.url, failure.attempts, failure.reason
            );
        }
    }
    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_download(
    _settings: &Settings,
    _work_table: &Path,
    _workers: usize,
    _tasks: bool,
) -> anyhow::Result<()> {
    anyhow::bail!("browser support was not compiled in; rebuild with the `browser` feature")
}
