//! Request URL resolution for consistent cache identities.

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

/// Resolve an intercepted request URL against the backend origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/static/app.js`) against `base`
/// 3. Require http or https
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Host lowercasing comes from the URL parser itself.
pub fn resolve(base: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}
