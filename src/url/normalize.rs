use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a URL into its canonical identity form
///
/// # Normalization Steps
///
/// 1. Parse the URL; if it does not parse, return the input unchanged
/// 2. Remove fragment (everything after #)
/// 3. Remove the query string
/// 4. Remove trailing slashes from the path (except for root /)
///
/// The canonical form is the uniqueness key for stored pages and the lookup
/// key when resolving link targets, so `normalize_url` never fails and is
/// idempotent.
///
/// # Examples
///
/// ```
/// use sitegraph::url::normalize_url;
///
/// assert_eq!(normalize_url("https://a.com/x/"), "https://a.com/x");
/// assert_eq!(normalize_url("https://a.com/x?q=1#f"), "https://a.com/x");
/// assert_eq!(normalize_url("https://a.com/"), "https://a.com/");
/// assert_eq!(normalize_url("not a url"), "not a url");
/// ```
pub fn normalize_url(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(url) => canonicalize(url).to_string(),
        Err(_) => url_str.to_string(),
    }
}

/// Applies the canonicalization steps to an already parsed URL
pub fn canonicalize(mut url: Url) -> Url {
    url.set_fragment(None);
    url.set_query(None);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let normalized_path = if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            };
            url.set_path(&normalized_path);
        }
    }

    url
}

/// Parses a URL strictly, accepting only HTTP(S) URLs with a host
///
/// Used for seed URLs and fetched page URLs, where an unusable address is an
/// error rather than something to pass through.
pub fn parse_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}
