//! Page record types produced by the extractor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that make a fetched document unusable
///
/// Missing elements (no title, no headings, no links) are valid content and
/// never produce an error.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid page URL '{url}': {message}")]
    InvalidPageUrl { url: String, message: String },

    #[error("Page URL has no host: {0}")]
    MissingHost(String),
}

/// A heading element found on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1 through 6
    pub level: u8,

    /// Trimmed heading text
    pub text: String,
}

/// Structured technical metadata about a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalData {
    /// `<meta>` tags keyed by name, property or http-equiv
    pub meta: BTreeMap<String, String>,

    /// Headings grouped by level, document order within each level
    pub headings: Vec<Heading>,

    /// Number of words in the visible body text
    pub word_count: usize,

    /// Number of `<a>` elements, internal or not
    pub links_count: usize,

    /// Number of `<img>` elements
    pub images_count: usize,
}

/// A same-host hyperlink with its anchor text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalLink {
    /// Absolute URL the link resolves to
    pub url: String,

    /// Trimmed visible text of the anchor, empty when there is none
    pub anchor: String,
}

/// Everything extracted from one fetched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL the document was loaded from
    pub url: String,

    /// Trimmed `<title>` text, empty when absent
    pub title: String,

    /// Fingerprint of the serialized document
    pub content_hash: String,

    /// When the document was extracted
    pub crawled_at: DateTime<Utc>,

    pub technical_data: TechnicalData,

    /// Reserved for enrichment outside the crawl pipeline
    #[serde(default)]
    pub semantic_data: serde_json::Map<String, serde_json::Value>,

    /// Deduplicated internal link URLs in order of first occurrence
    pub internal_links: Vec<String>,

    /// Every internal link occurrence paired with its anchor text
    #[serde(default)]
    pub internal_links_with_anchor: Vec<InternalLink>,
}
