use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL so that the crawl frontier can compare pages by identity
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters alphabetically
/// 7. Remove empty query string (trailing ?)
///
/// Scheme and `www.` prefix are kept: the result must still be navigable in
/// the browser session that owns the application's cookies.
///
/// # Examples
///
/// ```
/// use manualforge::url::normalize_url;
///
/// let url = normalize_url("https://APP.EXAMPLE.TEST/settings/#billing").unwrap();
/// assert_eq!(url.as_str(), "https://app.example.test/settings");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme_and_www() {
        let result = normalize_url("http://www.example.test/page").unwrap();
        assert_eq!(result.as_str(), "http://www.example.test/page");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.test/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.test/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.test/").unwrap();
        assert_eq!(result.as_str(), "https://example.test/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.test").unwrap();
        assert_eq!(result.as_str(), "https://example.test/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.test/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.test/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result = normalize_url("https://example.test/page?utm_source=mail&fbclid=1").unwrap();
        assert_eq!(result.as_str(), "https://example.test/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.test/list?page=2&filter=open").unwrap();
        assert_eq!(result.as_str(), "https://example.test/list?filter=open&page=2");
    }

    #[test]
    fn test_query_values_stay_encoded() {
        let result = normalize_url("https://example.test/search?q=a%20b").unwrap();
        assert_eq!(result.as_str(), "https://example.test/search?q=a+b");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.test/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.test/b/c");
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.test///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.test/path/to/page");
    }

    #[test]
    fn test_lowercase_host_keeps_path_case() {
        let result = normalize_url("https://EXAMPLE.TEST/Reports").unwrap();
        assert_eq!(result.as_str(), "https://example.test/Reports");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.test/page");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }
}
