//! Pipeline services built on the queue, the dispatcher and the browser
//! capability.

pub mod discovery;
pub mod download;

pub use discovery::{fill_supplier_codes, DiscoveryConfig, DiscoveryService};
pub use download::{
    expand, DownloadConfig, DownloadEvent, DownloadReport, DownloadService, FailedPage, PageItem,
};

/// Rows shown per listing page on the catalog site.
pub const LISTING_PAGE_SIZE: u32 = 500;
