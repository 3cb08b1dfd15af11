use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use manualforge::url::extract_host;
///
/// let url = Url::parse("https://APP.example.test/path").unwrap();
/// assert_eq!(extract_host(&url), Some("app.example.test".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when both URLs point at the same host and port
///
/// The crawl never leaves the application it started on, so subdomains count
/// as different hosts.
pub fn is_same_host(a: &Url, b: &Url) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(host_a), Some(host_b)) => {
            host_a == host_b && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_simple_host() {
        assert_eq!(
            extract_host(&url("https://example.test/")),
            Some("example.test".to_string())
        );
    }

    #[test]
    fn test_extract_with_port() {
        assert_eq!(
            extract_host(&url("http://127.0.0.1:8080/")),
            Some("127.0.0.1".to_string())
        );
    }

    #[test]
    fn test_same_host() {
        assert!(is_same_host(
            &url("https://example.test/a"),
            &url("https://EXAMPLE.test/b?x=1")
        ));
    }

    #[test]
    fn test_default_port_matches_explicit() {
        assert!(is_same_host(
            &url("https://example.test/"),
            &url("https://example.test:443/")
        ));
    }

    #[test]
    fn test_different_port_is_different_host() {
        assert!(!is_same_host(
            &url("http://127.0.0.1:8080/"),
            &url("http://127.0.0.1:9090/")
        ));
    }

    #[test]
    fn test_subdomain_is_different_host() {
        assert!(!is_same_host(
            &url("https://example.test/"),
            &url("https://docs.example.test/")
        ));
    }
}
