use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::dispatch::{DispatchMode, ParallelDispatcher};
use crate::models::{ProductGroup, SubProductGroup, Supplier, SupplierSpg};
use crate::repository::CatalogRepository;
use crate::scrapers::PageFetcher;
use crate::services::fill_supplier_codes;
use crate::workbook;

pub fn cmd_import(settings: &Settings, dir: &Path) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let repo = CatalogRepository::new(&settings.database_path())?;

    let pgs: Vec<ProductGroup> = workbook::read_records(&dir.join("pg.csv"))?;
    let spgs: Vec<SubProductGroup> = workbook::read_records(&dir.join("spg.csv"))?;
    let suppliers: Vec<Supplier> = workbook::read_records(&dir.join("supplier.csv"))?;
    let relations: Vec<SupplierSpg> = workbook::read_records(&dir.join("supplier_spg.csv"))?;

    let n_pg = repo.insert_product_groups(&pgs)?;
    let n_spg = repo.insert_sub_product_groups(&spgs)?;
    let n_sup = repo.insert_suppliers(&suppliers)?;
    let n_rel = repo.insert_supplier_spgs(&relations)?;

    println!(
        "{} Imported {n_pg} product groups, {n_spg} sub-groups, {n_sup} suppliers, {n_rel} relations",
        style("✓").green()
    );
    let skipped = suppliers.len() - n_sup;
    if skipped > 0 {
        println!(
            "{} {skipped} suppliers without a code were skipped",
            style("!").yellow()
        );
    }
    Ok(())
}

pub fn cmd_export(settings: &Settings, output: &Path) -> anyhow::Result<()> {
    let repo = CatalogRepository::new(&settings.database_path())?;
    let rows = repo.catalog_rows()?;
    workbook::write_records(output, &rows)?;
    println!(
        "{} Wrote {} catalog rows to {}",
        style("✓").green(),
        rows.len(),
        output.display()
    );
    Ok(())
}

/// Scrape missing supplier codes into the seed CSV, so `import` keeps
/// those rows. Suppliers already carrying a code are left untouched.
pub async fn cmd_codes(settings: &Settings, input: &Path, workers: usize) -> anyhow::Result<()> {
    let mut suppliers: Vec<Supplier> = workbook::read_records(input)?;
    let missing = suppliers
        .iter()
        .filter(|s| s.supplier_code.is_none())
        .count();
    if missing == 0 {
        println!("{} Every supplier already has a code", style("✓").green());
        return Ok(());
    }

    println!(
        "{} Scraping codes for {missing} suppliers",
        style("→").dim()
    );
    let fetcher = PageFetcher::new(settings.fetch_config())?;
    let dispatcher = ParallelDispatcher::new(workers, DispatchMode::Task);
    let filled = fill_supplier_codes(&fetcher, &dispatcher, &mut suppliers).await;

    workbook::write_records(input, &suppliers)?;
    println!(
        "{} Filled {} of {missing} missing supplier codes in {}",
        style("✓").green(),
        filled.len(),
        input.display()
    );
    Ok(())
}
