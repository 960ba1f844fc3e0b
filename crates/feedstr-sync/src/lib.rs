//! Adapters and batch driver that connect the reconciliation engine to the
//! outside world.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and identity validation
//! - [`relay`] - Relay URL normalization and the relay-backed ledger
//! - [`source`] - HTTP feed fetching and parsing
//! - [`markup`] - HTML to Markdown conversion
//! - [`batch`] - Runs all selected feeds once and summarizes the result
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │  HttpFeedSource  │     │  HtmlToMarkdown  │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌───────────────────────────────────────────┐
//! │       feedstr_core::Reconciler (per feed) │
//! └────────────────────┬──────────────────────┘
//!                      │
//!                      ▼
//!             ┌──────────────────┐
//!             │   RelayLedger    │  nostr-sdk Client
//!             └──────────────────┘
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod markup;
pub mod relay;
pub mod source;

pub use batch::{BatchOptions, BatchSummary, FeedFailure, run_batch};
pub use config::{Config, FeedConfig};
pub use error::{Error, Result};
pub use markup::HtmlToMarkdown;
pub use relay::RelayLedger;
pub use source::HttpFeedSource;
