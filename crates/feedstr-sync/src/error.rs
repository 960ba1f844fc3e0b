//! Error types for the sync binary's adapters and configuration.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the reconciliation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP error while fetching a feed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed document could not be parsed.
    #[error("Feed parse error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    /// Nostr SDK error.
    #[error("Nostr SDK error: {0}")]
    NostrSdk(#[from] nostr_sdk::client::Error),

    /// Key parsing error.
    #[error("Key error: {0}")]
    Key(#[from] nostr::key::Error),

    /// Error from the reconciliation engine.
    #[error(transparent)]
    Core(#[from] feedstr_core::Error),
}
