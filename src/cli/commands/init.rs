use console::style;

use crate::config::Settings;
use crate::repository::CatalogRepository;

pub fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let db_path = settings.database_path();
    CatalogRepository::new(&db_path)?;

    println!(
        "{} Initialized catalog database at {}",
        style("✓").green(),
        db_path.display()
    );
    println!(
        "{} Download tree root: {}",
        style("→").dim(),
        settings.index_dir.display()
    );
    Ok(())
}
