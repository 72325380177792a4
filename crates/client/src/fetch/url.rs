//! Resolution of caller-supplied URLs against the agent's origin.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target the way a page on `origin` would.
///
/// 1. Trim leading/trailing whitespace
/// 2. Absolute URLs are taken as-is; anything else is joined onto `origin`
/// 3. Only http and https survive
/// 4. Lowercase the host
/// 5. Keep the fragment; caches ignore it
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        origin.join(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    Ok(parsed)
}

/// Whether `url` belongs to `origin` (scheme, host and port all match).
pub fn same_origin(origin: &Url, url: &Url) -> bool {
    origin.origin() == url.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8000").unwrap()
    }

    #[test]
    fn test_resolve_path() {
        let url = resolve(&origin(), "/wiki/Cat").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/wiki/Cat");
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve(&origin(), "https://EN.wikipedia.org/wiki/Cat").unwrap();
        assert_eq!(url.as_str(), "https://en.wikipedia.org/wiki/Cat");
    }

    #[test]
    fn test_resolve_trims_and_keeps_query() {
        let url = resolve(&origin(), "  /search.json?s=cat  ").unwrap();
        assert_eq!(url.query(), Some("s=cat"));
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert!(matches!(resolve(&origin(), "file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let o = origin();
        assert!(same_origin(&o, &Url::parse("http://localhost:8000/wiki/Cat").unwrap()));
        assert!(!same_origin(&o, &Url::parse("http://localhost:9000/").unwrap()));
        assert!(!same_origin(&o, &Url::parse("https://localhost:8000/").unwrap()));
    }
}
