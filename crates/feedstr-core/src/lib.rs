//! Core reconciliation engine for mirroring syndication feeds onto Nostr.
//!
//! Each configured feed owns one publishing identity. A run fetches the feed,
//! normalizes its entries into items, works out which items the identity has
//! already published by scanning its recent history on the relays, and
//! publishes the rest oldest first. The ledger itself is the only state: no
//! local database is kept between runs.
//!
//! ```text
//! FeedSource ─► normalize ─► scan_published ─► publish
//!  (entries)     (items)     (GUID markers)    (posts)
//! ```
//!
//! This crate provides:
//! - GUID marker encoding and decoding ([`marker`])
//! - Feed entry normalization ([`item`])
//! - Windowed history scanning ([`history`])
//! - Per-feed reconciliation and profile sync ([`reconcile`], [`profile`])
//! - Cancellation and timeout scoping for ledger and feed I/O ([`context`])
//! - Prometheus metric descriptions ([`metrics`])

mod error;
pub mod context;
pub mod history;
pub mod item;
pub mod ledger;
pub mod marker;
pub mod metrics;
pub mod profile;
pub mod reconcile;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Entries beyond this many, in feed order, are ignored on every run.
pub const MAX_FEED_ENTRIES: usize = 200;

pub use context::{IoScope, ScopeGuard};
pub use error::{Error, Result};
pub use history::{SCAN_WINDOW, SeenSet, scan_published};
pub use item::{SyncItem, normalize};
pub use ledger::{Identity, Ledger, RecordHeader};
pub use profile::{ProfileOutcome, desired_profile, sync_profile};
pub use reconcile::{Aborted, FeedTarget, Outcome, ReconcileOptions, Reconciler, Stage, SyncReport};
pub use source::{EntryLink, EntryText, FeedEntry, FeedSource, MarkupConverter, TextKind};
