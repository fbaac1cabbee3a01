// Validation helpers for user-supplied URLs and paths

use anyhow::{ensure, Context, Result};
use url::Url;

/// Maximum URL length accepted on the command line
const MAX_URL_LENGTH: usize = 2048;

/// Validates the root folder URL of a crawl
///
/// Checks:
/// - non-empty and within `MAX_URL_LENGTH`
/// - no control characters
/// - http or https scheme with a hostname
pub fn validate_web_url(url_str: &str) -> Result<Url> {
    let trimmed = url_str.trim();

    ensure!(!trimmed.is_empty(), "URL cannot be empty");
    ensure!(
        trimmed.len() <= MAX_URL_LENGTH,
        "URL is too long ({} characters, max {})",
        trimmed.len(),
        MAX_URL_LENGTH
    );
    ensure!(
        !trimmed.chars().any(|c| c.is_control()),
        "URL contains control characters"
    );

    let url = Url::parse(trimmed).context("Invalid URL format")?;

    let scheme = url.scheme();
    ensure!(
        scheme == "http" || scheme == "https",
        "URL must use http or https protocol, got: {}",
        scheme
    );
    ensure!(url.host_str().is_some(), "URL has no hostname");

    Ok(url)
}

/// Validates a directory path given on the command line or in the config
pub fn validate_directory_path(path: &str) -> Result<()> {
    ensure!(!path.trim().is_empty(), "Path cannot be empty");
    ensure!(!path.contains('\0'), "Path contains null byte");
    Ok(())
}
