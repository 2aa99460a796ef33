//! partdex - distributor catalog scraping and bulk product-index download.
//!
//! Scrapes a distributor's product-catalog site, persists the normalized
//! catalog (product groups, sub-groups, suppliers and their relations) into
//! SQLite, and bulk-downloads paginated product listings per sub-group into
//! a deterministic directory tree.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod models;
pub mod paths;
pub mod queue;
pub mod repository;
pub mod scrapers;
pub mod services;
pub mod workbook;
