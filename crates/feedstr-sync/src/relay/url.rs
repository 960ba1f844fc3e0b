//! Relay URL normalization.
//!
//! Configured relay URLs are normalized before connecting so that cosmetic
//! variations do not open two connections to the same relay.
//!
//! # Normalization Rules
//!
//! - Trim surrounding whitespace
//! - Require a websocket scheme (wss:// or ws://)
//! - Lowercase the scheme and host
//! - Remove trailing slashes
//! - Preserve port numbers and paths

use nostr_sdk::RelayUrl;

/// Result of URL normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeResult {
    /// URL is valid and normalized.
    Ok(String),
    /// URL is syntactically invalid.
    Invalid(String),
}

/// Normalize a relay URL.
///
/// ```ignore
/// use feedstr_sync::relay::url::{NormalizeResult, normalize_relay_url};
///
/// assert_eq!(
///     normalize_relay_url("wss://Relay.Example.COM/"),
///     NormalizeResult::Ok("wss://relay.example.com".to_string())
/// );
/// ```
pub fn normalize_relay_url(url: &str) -> NormalizeResult {
    let url = url.trim();

    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("wss://") && !lower.starts_with("ws://") {
        return NormalizeResult::Invalid("URL must start with wss:// or ws://".to_string());
    }

    // RelayUrl lowercases scheme and host but leaves the path alone.
    let parsed = match RelayUrl::parse(url) {
        Ok(u) => u,
        Err(e) => return NormalizeResult::Invalid(format!("Invalid relay URL: {}", e)),
    };

    let mut normalized = parsed.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }

    if extract_host(&normalized).is_empty() {
        return NormalizeResult::Invalid("empty host".to_string());
    }

    NormalizeResult::Ok(normalized)
}

/// Normalize and deduplicate a list of relay URLs, keeping first-seen order.
///
/// Fails on the first URL that does not normalize.
pub fn normalize_relay_urls<S: AsRef<str>>(urls: &[S]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        match normalize_relay_url(url.as_ref()) {
            NormalizeResult::Ok(normalized) => {
                if !out.contains(&normalized) {
                    out.push(normalized);
                }
            }
            NormalizeResult::Invalid(reason) => {
                return Err(format!("{}: {}", url.as_ref(), reason));
            }
        }
    }
    Ok(out)
}

/// Extract the host portion from a websocket URL.
fn extract_host(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .unwrap_or(url);

    without_scheme.split('/').next().unwrap_or(without_scheme)
}
