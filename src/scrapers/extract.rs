//! Record extractors for specific page layouts.
//!
//! Layout parsing is deliberately isolated here so the pipelines treat it
//! as a pluggable capability: they take an extractor function, not a
//! hardcoded selector.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;

use super::FetchedPage;

fn supplier_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"v=([^&/?#]+)").expect("valid supplier code pattern"))
}

/// Pull the supplier code out of a supplier-center page.
///
/// The code is the `v=` query parameter of the first sub-group link in
/// the listing table. Suppliers without one (mostly mergers and
/// acquisitions) yield `None`.
pub fn supplier_code(page: &FetchedPage) -> Option<String> {
    let selector = Selector::parse("#table_arw_wrapper li a").ok()?;
    let doc = page.document();
    let href = doc.select(&selector).next()?.value().attr("href")?;
    let last_segment = href.rsplit('/').next()?;
    supplier_code_pattern()
        .captures(last_segment)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            status: StatusCode::OK,
            body: body.to_string(),
        }
    }

    #[test]
    fn extracts_code_from_first_subgroup_link() {
        let body = r#"
            <table id="table_arw_wrapper"><tr><td><ul>
                <li><a href="/products/en/connectors/usb/314?v=1q">USB</a></li>
                <li><a href="/products/en/connectors/rf/315?v=zz">RF</a></li>
            </ul></td></tr></table>
        "#;
        assert_eq!(supplier_code(&page(body)), Some("1q".to_string()));
    }

    #[test]
    fn missing_table_yields_none() {
        assert_eq!(supplier_code(&page("<html><body></body></html>")), None);
    }

    #[test]
    fn link_without_code_yields_none() {
        let body = r#"
            <table id="table_arw_wrapper"><tr><td><ul>
                <li><a href="/products/en/connectors/usb/314">USB</a></li>
            </ul></td></tr></table>
        "#;
        assert_eq!(supplier_code(&page(body)), None);
    }
}
