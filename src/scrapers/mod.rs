//! Scraping clients: HTTP fetcher and browser-automation capability.

pub mod browser;
pub mod extract;
mod fetch;

pub use fetch::{FetchConfig, FetchError, FetchedPage, PageFetcher};
