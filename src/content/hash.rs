use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE_BLOCK: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref DATA_ATTR: Regex = Regex::new(r#"(?i)data-[^=]*="[^"]*""#).unwrap();
    static ref ID_ATTR: Regex = Regex::new(r#"(?i)id="[^"]*""#).unwrap();
    static ref CLASS_ATTR: Regex = Regex::new(r#"(?i)class="[^"]*""#).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Strips volatile markup from an HTML document
///
/// # Normalization Steps
///
/// 1. Remove `<script>` blocks including their contents
/// 2. Remove `<style>` blocks including their contents
/// 3. Remove HTML comments
/// 4. Remove `data-*`, `id` and `class` attribute assignments
/// 5. Collapse whitespace runs to a single space and trim
///
/// Only attribute *values* are neutral: `<div class="a">` becomes `<div >`,
/// which still differs from a bare `<div>`, so adding or removing one of
/// these attributes changes the result.
pub fn normalize_markup(html: &str) -> String {
    let cleaned = SCRIPT_BLOCK.replace_all(html, "");
    let cleaned = STYLE_BLOCK.replace_all(&cleaned, "");
    let cleaned = HTML_COMMENT.replace_all(&cleaned, "");
    let cleaned = DATA_ATTR.replace_all(&cleaned, "");
    let cleaned = ID_ATTR.replace_all(&cleaned, "");
    let cleaned = CLASS_ATTR.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");

    cleaned.trim().to_string()
}

/// Computes the content fingerprint of an HTML document
///
/// The fingerprint is the lowercase hex SHA-256 of [`normalize_markup`], so it
/// ignores styling hooks, script noise and formatting while still changing
/// whenever the visible text or structure changes.
///
/// # Examples
///
/// ```
/// use sitegraph::content::content_hash;
///
/// let a = content_hash(r#"<p class="old">Hello</p>"#);
/// let b = content_hash(r#"<p class="new">Hello</p>"#);
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn content_hash(html: &str) -> String {
    let normalized = normalize_markup(html);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
