//! Link discovery for the fetch engine
//!
//! The engine needs the followable links of every fetched page to grow its
//! frontier. Unlike the page extractor this does not restrict links to the
//! page host; the engine applies its own allow list.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref FOLLOWABLE: Selector = Selector::parse("a[href]").unwrap();
}

/// Extracts all followable links from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags resolving to HTTP(S) URLs
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links (same page anchors)
/// - hrefs that do not resolve
///
/// Links are returned in document order without duplicates.
pub fn discover_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&FOLLOWABLE) {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(resolved) = resolve_link(href, base_url) {
                if seen.insert(resolved.to_string()) {
                    links.push(resolved);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None if the link should not be followed.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute)
        }
        _ => None,
    }
}
