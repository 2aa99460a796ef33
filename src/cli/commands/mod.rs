//! Command definitions and dispatch.

mod catalog;
mod discover;
mod download;
mod init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "partdex")]
#[command(about = "Distributor catalog scraper and bulk product-index downloader")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to ./partdex.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Peek at the raw arguments before clap runs, so logging can be set up
/// first thing in `main`.
pub fn is_verbose() -> bool {
    scan_verbose(std::env::args().skip(1))
}

/// Options that consume the following token as a value; a literal `-v`
/// in that position is a value, not the verbose flag.
const VALUE_OPTIONS: &[&str] = &["-c", "--config", "-o", "--output", "-w", "--workers"];

fn scan_verbose(args: impl Iterator<Item = String>) -> bool {
    let mut args = args;
    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        if arg == "-v" || arg == "--verbose" {
            return true;
        }
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            let _ = args.next();
        }
    }
    false
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and catalog database
    Init,

    /// Manage the catalog store
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// Build the download work table for one supplier
    Discover {
        /// Supplier id to discover
        supplier_id: i64,

        /// Output work-table CSV path
        #[arg(short, long, default_value = "dl_spg.csv")]
        output: PathBuf,

        /// Skip the part-status pass and keep every row
        #[arg(long)]
        skip_status: bool,
    },

    /// Download every listing page named by a work table
    Download {
        /// Work-table CSV produced by `discover`
        work_table: PathBuf,

        /// Number of download workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Run workers as concurrent tasks instead of dedicated threads
        #[arg(long)]
        tasks: bool,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Import catalog seed CSVs (pg.csv, spg.csv, supplier.csv, supplier_spg.csv)
    Import {
        /// Directory holding the seed CSVs
        dir: PathBuf,
    },

    /// Export the product-group/sub-group join as a CSV work table
    Export {
        #[arg(short, long, default_value = "catalog.csv")]
        output: PathBuf,
    },

    /// Backfill missing supplier codes from the supplier-center pages
    ///
    /// Rewrites the given supplier seed CSV in place; run before `import`
    /// so code-less rows are not dropped.
    Codes {
        /// Supplier seed CSV
        input: PathBuf,

        /// Concurrent fetches
        #[arg(short, long, default_value = "8")]
        workers: usize,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings),
        Commands::Catalog { command } => match command {
            CatalogCommands::Import { dir } => catalog::cmd_import(&settings, &dir),
            CatalogCommands::Export { output } => catalog::cmd_export(&settings, &output),
            CatalogCommands::Codes { input, workers } => {
                catalog::cmd_codes(&settings, &input, workers).await
            }
        },
        Commands::Discover {
            supplier_id,
            output,
            skip_status,
        } => discover::cmd_discover(&settings, supplier_id, &output, skip_status).await,
        Commands::Download {
            work_table,
            workers,
            tasks,
        } => download::cmd_download(&settings, &work_table, workers, tasks).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(args: &[&str]) -> bool {
        scan_verbose(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn verbose_flag_is_detected_anywhere() {
        assert!(scan(&["download", "dl_spg.csv", "-v"]));
        assert!(scan(&["--verbose", "init"]));
        assert!(!scan(&["download", "dl_spg.csv"]));
    }

    #[test]
    fn option_values_are_not_mistaken_for_the_flag() {
        assert!(!scan(&["discover", "7", "--output", "-v"]));
        assert!(!scan(&["init", "-c", "--verbose"]));
        assert!(scan(&["discover", "7", "--output", "out.csv", "-v"]));
    }

    #[test]
    fn scanning_stops_at_the_argument_terminator() {
        assert!(!scan(&["download", "--", "-v"]));
        assert!(scan(&["-v", "--", "x"]));
    }
}
