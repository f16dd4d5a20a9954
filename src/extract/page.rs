//! HTML page extractor
//!
//! Turns a fetched HTML document into a [`PageRecord`]: title, content
//! fingerprint, meta tags, headings, word and element counts, and the
//! internal links of the page with their anchor text.

use crate::content::content_hash;
use crate::extract::types::{ExtractError, Heading, InternalLink, PageRecord, TechnicalData};
use crate::url::{parse_url, same_host};
use crate::UrlError;
use chrono::Utc;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref META: Selector = Selector::parse("meta").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a").unwrap();
    static ref ANCHOR_WITH_HREF: Selector = Selector::parse("a[href]").unwrap();
    static ref IMAGE: Selector = Selector::parse("img").unwrap();
    static ref HEADINGS: Vec<(u8, Selector)> = (1..=6u8)
        .map(|level| (level, Selector::parse(&format!("h{}", level)).unwrap()))
        .collect();
}

/// Attributes that can name a `<meta>` tag, in order of preference
const META_KEY_ATTRS: [&str; 3] = ["name", "property", "http-equiv"];

/// Elements whose text is not part of the visible body text
const INVISIBLE_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Extracts a page record from a fetched HTML document
///
/// # Arguments
///
/// * `fetched_url` - The URL the document was loaded from; relative links are
///   resolved against it and only links to its host are kept as internal
/// * `html` - The raw HTML document
///
/// # Returns
///
/// * `Ok(PageRecord)` - The extracted page
/// * `Err(ExtractError)` - The page URL is unusable, so nothing can be keyed
///
/// # Example
///
/// ```
/// use sitegraph::extract::extract_page;
///
/// let html = r#"<html><head><title> Home </title></head>
///     <body><a href="/about">About us</a><a href="https://other.com/">Out</a></body></html>"#;
/// let page = extract_page("https://example.com/", html).unwrap();
/// assert_eq!(page.title, "Home");
/// assert_eq!(page.internal_links, vec!["https://example.com/about".to_string()]);
/// assert_eq!(page.technical_data.links_count, 2);
/// ```
pub fn extract_page(fetched_url: &str, html: &str) -> Result<PageRecord, ExtractError> {
    let base_url = parse_url(fetched_url).map_err(|e| match e {
        UrlError::MissingHost => ExtractError::MissingHost(fetched_url.to_string()),
        other => ExtractError::InvalidPageUrl {
            url: fetched_url.to_string(),
            message: other.to_string(),
        },
    })?;

    let document = Html::parse_document(html);

    let links_with_anchor = extract_internal_links(&document, &base_url);
    let internal_links = dedup_urls(&links_with_anchor);

    let technical_data = TechnicalData {
        meta: extract_meta(&document),
        headings: extract_headings(&document),
        word_count: count_words(&document),
        links_count: document.select(&ANCHOR).count(),
        images_count: document.select(&IMAGE).count(),
    };

    Ok(PageRecord {
        url: fetched_url.to_string(),
        title: extract_title(&document),
        content_hash: content_hash(&document.html()),
        crawled_at: Utc::now(),
        technical_data,
        semantic_data: serde_json::Map::new(),
        internal_links,
        internal_links_with_anchor: links_with_anchor,
    })
}

fn extract_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Builds the meta-tag map; later duplicates overwrite earlier ones
fn extract_meta(document: &Html) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();

    for element in document.select(&META) {
        let attrs = element.value();
        let key = META_KEY_ATTRS
            .iter()
            .filter_map(|name| attrs.attr(name))
            .find(|value| !value.is_empty());
        let content = attrs.attr("content").filter(|value| !value.is_empty());

        if let (Some(key), Some(content)) = (key, content) {
            meta.insert(key.to_string(), content.to_string());
        }
    }

    meta
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let mut headings = Vec::new();

    for (level, selector) in HEADINGS.iter() {
        for element in document.select(selector) {
            headings.push(Heading {
                level: *level,
                text: element.text().collect::<String>().trim().to_string(),
            });
        }
    }

    headings
}

/// Counts whitespace-delimited words in the visible body text
fn count_words(document: &Html) -> usize {
    let Some(body) = document.select(&BODY).next() else {
        return 0;
    };

    visible_text(body).split_whitespace().count()
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();

    for node in root.descendants() {
        if let Node::Text(fragment) = node.value() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|element| INVISIBLE_ELEMENTS.contains(&element.name()))
                    .unwrap_or(false)
            });
            if !hidden {
                text.push_str(fragment);
            }
        }
    }

    text
}

/// Collects every same-host anchor with its trimmed text
///
/// Hrefs that fail to resolve are skipped.
fn extract_internal_links(document: &Html, base_url: &Url) -> Vec<InternalLink> {
    let mut links = Vec::new();

    for element in document.select(&ANCHOR_WITH_HREF) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(resolved) = base_url.join(href.trim()) else {
            continue;
        };

        if !same_host(&resolved, base_url) {
            continue;
        }

        links.push(InternalLink {
            url: resolved.to_string(),
            anchor: element.text().collect::<String>().trim().to_string(),
        });
    }

    links
}

fn dedup_urls(links: &[InternalLink]) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter(|link| seen.insert(link.url.as_str()))
        .map(|link| link.url.clone())
        .collect()
}
