/// Checks if a host matches an allowed-domain pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain of it
///
/// Hosts are expected in lowercase, as returned by
/// [`extract_host`](crate::url::extract_host).
///
/// # Examples
///
/// ```
/// use sitegraph::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "docs.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || (host.len() > base.len()
                    && host.ends_with(base)
                    && host.as_bytes()[host.len() - base.len() - 1] == b'.')
        }
        None => host == pattern,
    }
}

/// Returns true if the host matches at least one of the patterns
pub fn matches_any<S: AsRef<str>>(patterns: &[S], host: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_wildcard(pattern.as_ref(), host))
}
