use std::path::Path;

use crate::config::Settings;

#[cfg(feature = "browser")]
pub async fn cmd_discover(
    settings: &Settings,
    supplier_id: i64,
    output: &Path,
    skip_status: bool,
) -> anyhow::Result<()> {
    use console::style;

    use crate::repository::CatalogRepository;
    use crate::scrapers::browser::CdpDriver;
    use crate::services::DiscoveryService;
    use crate::workbook;

    let repo = CatalogRepository::new(&settings.database_path())?;
    let mut rows = repo.dl_rows(supplier_id)?;
    if rows.is_empty() {
        println!(
            "{} No sub-groups found for supplier {supplier_id}",
            style("!").yellow()
        );
        return Ok(());
    }

    println!(
        "{} Discovering {} sub-groups for supplier {supplier_id}",
        style("→").dim(),
        rows.len()
    );
    let service = DiscoveryService::new(
        CdpDriver::new(settings.session_config()),
        settings.discovery_config(),
    );

    if !skip_status {
        let report = service.fill_statuses(&mut rows).await;
        print_abandoned("status", &report);
        let before = rows.len();
        rows.retain(|row| row.is_active());
        let dropped = before - rows.len();
        if dropped > 0 {
            println!("{} Dropped {dropped} obsolete sub-groups", style("→").dim());
        }
    }

    let report = service.fill_page_counts(&mut rows).await;
    print_abandoned("page-count", &report);

    workbook::write_work_table(output, &rows)?;
    println!(
        "{} Wrote work table with {} rows to {}",
        style("✓").green(),
        rows.len(),
        output.display()
    );
    Ok(())
}

#[cfg(feature = "browser")]
fn print_abandoned(
    pass: &str,
    report: &crate::queue::DrainReport<crate::services::discovery::RowProbe>,
) {
    use console::style;

    use crate::queue::WorkItem;

    if report.abandoned.is_empty() {
        return;
    }
    println!(
        "{} {} {pass} probes left unresolved:",
        style("!").yellow(),
        report.abandoned.len()
    );
    for abandoned in &report.abandoned {
        println!(
            "  {} after {} attempts: {}",
            abandoned.item.key(),
            abandoned.attempts,
            abandoned.reason
        );
    }
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_discover(
    _settings: &Settings,
    _supplier_id: i64,
    _output: &Path,
    _skip_status: bool,
) -> anyhow::Result<()> {
    anyhow::bail!("browser support was not compiled in; rebuild with the `browser` feature")
}
