//! Data models for the catalog and the download work table.

use serde::{Deserialize, Serialize};

/// Top-level catalog category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub pg_id: i64,
    pub pg: String,
    pub pg_url: String,
    pub pg_url_key: String,
}

/// Second-level catalog category, owned by one product group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProductGroup {
    pub spg_id: i64,
    pub pg_id: i64,
    pub spg: String,
    pub spg_url: String,
    pub spg_url_key: String,
}

/// A manufacturer listed on the catalog site.
///
/// `supplier_code` is the site-specific `v=` query parameter identifying
/// the manufacturer within a sub-group listing. It is absent for some
/// suppliers (mostly mergers and acquisitions) until code discovery fills
/// it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: i64,
    pub supplier: String,
    pub supplier_url: String,
    pub supplier_url_key: String,
    pub supplier_code: Option<String>,
}

/// Join row for the supplier <-> sub-product-group N:M relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSpg {
    pub supplier_spg_id: i64,
    pub supplier_id: i64,
    pub spg_id: i64,
}

/// Part lifecycle status read from a product detail page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartStatus {
    #[default]
    Active,
    Obsolete,
}

impl PartStatus {
    /// Normalize a status label scraped from the page: whitespace is
    /// collapsed away and the match is case-insensitive.
    pub fn parse_label(text: &str) -> Option<Self> {
        let collapsed: String = text.split_whitespace().collect();
        match collapsed.to_ascii_lowercase().as_str() {
            "active" => Some(PartStatus::Active),
            "obsolete" => Some(PartStatus::Obsolete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartStatus::Active => "Active",
            PartStatus::Obsolete => "Obsolete",
        }
    }
}

/// One row of the sub-group work table driving discovery and download.
///
/// Produced by the catalog join query with `num_page` unknown and the
/// status assumed Active; the discovery phases mutate rows in place by
/// their original index, then Active rows are expanded into per-page
/// download items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub spg_id: i64,
    pub pg_url_key: String,
    pub spg_url: String,
    pub spg_url_key: String,
    #[serde(default)]
    pub supplier_code: Option<String>,
    #[serde(default)]
    pub num_page: u32,
    #[serde(rename = "part-status", default)]
    pub status: PartStatus,
}

impl CatalogRow {
    pub fn is_active(&self) -> bool {
        self.status == PartStatus::Active
    }
}
