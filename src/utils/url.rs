// src/utils/url.rs

//! URL helpers for user-entered page addresses.

use url::Url;

use crate::error::{AppError, Result};

/// Turn a user-entered address into an absolute URL.
///
/// Addresses without a scheme get `http://`.
///
/// # Examples
/// ```
/// use update_scanner::utils::url::normalize_url;
///
/// assert_eq!(
///     normalize_url("example.com/news").unwrap(),
///     "http://example.com/news"
/// );
/// ```
pub fn normalize_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("URL is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = Url::parse(&candidate)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(AppError::validation(format!(
            "unsupported URL scheme: {other}"
        ))),
    }
}
