//! Error types for the reconciliation engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling a feed against the ledger.
#[derive(Error, Debug)]
pub enum Error {
    /// A feed entry could not be turned into a publishable item.
    #[error("invalid entry: {0}")]
    InvalidItem(String),

    /// The feed document could not be retrieved or parsed.
    #[error("failed to fetch feed {url}: {reason}")]
    Fetch {
        /// The feed URL.
        url: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// A ledger read or write failed.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// An I/O operation did not complete within the request timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that was in flight.
        operation: &'static str,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The enclosing scope was cancelled while the operation was in flight.
    #[error("{operation} cancelled")]
    Cancelled {
        /// The operation that was in flight.
        operation: &'static str,
    },

    /// Event signing failed.
    #[error("signing error: {0}")]
    Signing(#[from] nostr::event::builder::Error),
}

impl Error {
    /// Whether this error came from the enclosing scope being cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_item_display() {
        let err = Error::InvalidItem("publish timestamp is the epoch".to_string());
        let msg = err.to_string();
        assert!(msg.contains("invalid entry"));
        assert!(msg.contains("epoch"));
    }

    #[test]
    fn test_fetch_display() {
        let err = Error::Fetch {
            url: "https://example.com/feed.xml".to_string(),
            reason: "HTTP 503".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/feed.xml"));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            operation: "fetch feed",
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "fetch feed timed out after 30s");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_display() {
        let err = Error::Cancelled {
            operation: "publish post",
        };
        assert_eq!(err.to_string(), "publish post cancelled");
        assert!(err.is_cancelled());
    }
}
