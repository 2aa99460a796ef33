//! Deterministic download-path derivation from catalog business keys.
//!
//! Every downloaded listing page lands in a directory derived solely from
//! the row's group/sub-group url keys and the page number, so concurrent
//! workers produce the same tree regardless of execution order.

use std::path::{Path, PathBuf};

/// Listing pages grouped into one `batch_{n}` subdirectory.
pub const BATCH_PAGES: u32 = 100;

/// Resolves destination directories for downloaded listing pages.
///
/// Pure path arithmetic - no I/O. Directory creation is the caller's
/// responsibility (idempotent `create_dir_all`).
#[derive(Debug, Clone)]
pub struct CatalogPathResolver {
    base_dir: PathBuf,
}

impl CatalogPathResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Destination for one listing page:
    /// `{base}/{pg_url_key}/{spg_url_key}/batch_{ceil(page / 100)}`.
    ///
    /// `page` is 1-based; pages 1-100 share `batch_1`, 101-200 `batch_2`, etc.
    pub fn resolve(&self, pg_url_key: &str, spg_url_key: &str, page: u32) -> PathBuf {
        let batch = page.max(1).div_ceil(BATCH_PAGES);
        self.base_dir
            .join(pg_url_key)
            .join(spg_url_key)
            .join(format!("batch_{batch}"))
    }
}
