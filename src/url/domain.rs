use url::Url;

/// Extracts the host from a URL
///
/// This function retrieves the host portion of a URL (without the port) and
/// converts it to lowercase. Returns None for URLs without a host such as
/// `mailto:` or `data:` URLs.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitegraph::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("mailto:someone@example.com").unwrap();
/// assert_eq!(extract_host(&url), None);
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host
///
/// Ports and schemes are not compared, so `http://a.com/` and
/// `https://a.com:8443/` are on the same host. URLs without a host never
/// match anything.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(host_a), Some(host_b)) => host_a == host_b,
        _ => false,
    }
}
