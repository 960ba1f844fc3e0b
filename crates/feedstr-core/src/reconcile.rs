//! Per-feed reconciliation: fetch, normalize, dedupe against the ledger, and
//! publish what is missing.
//!
//! # Stages
//!
//! ```text
//! Fetching ─► Normalizing ─► Deduplicating ─► Publishing ─► Done
//!     │            │               │               │
//!     └────────────┴───────┬───────┴───────────────┘
//!                          ▼
//!                       Aborted
//! ```
//!
//! Items are published oldest first, one at a time, each acknowledged before
//! the next is signed. If a run dies partway, what made it out is a
//! contiguous run of the oldest items, the next run's oldest pending item is
//! newer than anything published, and the history scan picks up exactly
//! where this run stopped.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use metrics::counter;
use nostr::{EventBuilder, EventId, Tag, TagKind};

use crate::context::IoScope;
use crate::history::{self, DEFAULT_PAGE_SIZE, SCAN_WINDOW};
use crate::item::{self, SyncItem};
use crate::ledger::{Identity, Ledger};
use crate::source::{FeedSource, MarkupConverter};
use crate::{Error, MAX_FEED_ENTRIES, Result};

/// Where a feed's run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Normalizing,
    Deduplicating,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Deduplicating => "deduplicating",
            Self::Publishing => "publishing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tuning knobs for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Entries beyond this many (in feed order) are ignored.
    pub max_entries: usize,
    /// How far behind the oldest pending item the history scan reaches.
    pub scan_window: Duration,
    /// Headers requested per history page.
    pub history_page_size: usize,
    /// Run every stage but submit nothing.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_entries: MAX_FEED_ENTRIES,
            scan_window: SCAN_WINDOW,
            history_page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
        }
    }
}

/// One feed to reconcile.
#[derive(Debug, Clone)]
pub struct FeedTarget<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub identity: &'a Identity,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The feed had no usable entries.
    NoItems,
    /// Every item was already on the ledger.
    UpToDate,
    /// At least one item was published (or would have been, in a dry run).
    Published,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub feed: String,
    pub outcome: Outcome,
    /// Entries returned by the feed.
    pub entries_fetched: usize,
    /// Entries kept after the cap.
    pub entries_considered: usize,
    /// Entries dropped for lacking a date or being invalid.
    pub entries_skipped: usize,
    /// Entries dropped because an older entry in the same fetch had the same GUID.
    pub duplicates: usize,
    /// Items whose GUID was found in the history scan.
    pub already_published: usize,
    /// Records appended, in submission order. Empty in a dry run.
    pub published: Vec<EventId>,
    /// Items that would have been published in a dry run.
    pub would_publish: usize,
}

impl SyncReport {
    fn new(feed: &str) -> Self {
        Self {
            feed: feed.to_string(),
            outcome: Outcome::NoItems,
            entries_fetched: 0,
            entries_considered: 0,
            entries_skipped: 0,
            duplicates: 0,
            already_published: 0,
            published: Vec::new(),
            would_publish: 0,
        }
    }
}

/// A run that stopped before finishing.
#[derive(Debug, thiserror::Error)]
#[error("feed {feed:?} aborted while {stage} after publishing {published} item(s): {source}")]
pub struct Aborted {
    pub feed: String,
    pub stage: Stage,
    /// Records already appended before the failure.
    pub published: usize,
    #[source]
    pub source: Error,
}

/// Drives feeds through the reconciliation stages.
pub struct Reconciler<'a, L, F, M> {
    ledger: &'a L,
    source: &'a F,
    converter: &'a M,
    options: ReconcileOptions,
}

impl<'a, L, F, M> Reconciler<'a, L, F, M>
where
    L: Ledger,
    F: FeedSource,
    M: MarkupConverter,
{
    pub fn new(ledger: &'a L, source: &'a F, converter: &'a M, options: ReconcileOptions) -> Self {
        Self {
            ledger,
            source,
            converter,
            options,
        }
    }

    /// Bring one feed's identity up to date with the feed.
    pub async fn reconcile(
        &self,
        feed: &FeedTarget<'_>,
        scope: &IoScope,
    ) -> std::result::Result<SyncReport, Aborted> {
        let mut report = SyncReport::new(feed.name);
        let mut stage = Stage::Fetching;

        match self.run(feed, scope, &mut report, &mut stage).await {
            Ok(()) => {
                tracing::info!(
                    feed = feed.name,
                    outcome = ?report.outcome,
                    fetched = report.entries_fetched,
                    skipped = report.entries_skipped,
                    duplicates = report.duplicates,
                    already_published = report.already_published,
                    published = report.published.len(),
                    "feed reconciled"
                );
                Ok(report)
            }
            Err(source) => Err(Aborted {
                feed: feed.name.to_string(),
                stage,
                published: report.published.len(),
                source,
            }),
        }
    }

    async fn run(
        &self,
        feed: &FeedTarget<'_>,
        scope: &IoScope,
        report: &mut SyncReport,
        stage: &mut Stage,
    ) -> Result<()> {
        // Fetching
        let mut entries = scope.run("fetch feed", self.source.fetch(feed.url)).await?;
        report.entries_fetched = entries.len();
        if entries.len() > self.options.max_entries {
            tracing::debug!(
                total = entries.len(),
                cap = self.options.max_entries,
                "feed exceeds entry cap, ignoring the rest"
            );
            entries.truncate(self.options.max_entries);
        }
        report.entries_considered = entries.len();

        // Normalizing
        *stage = Stage::Normalizing;
        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            match item::normalize(entry, self.converter) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {
                    report.entries_skipped += 1;
                    tracing::warn!(id = ?entry.id, "skipping entry without a publish date");
                }
                Err(e) => {
                    report.entries_skipped += 1;
                    tracing::warn!(id = ?entry.id, error = %e, "skipping invalid entry");
                }
            }
        }
        counter!("feedstr_items_skipped_total").increment(report.entries_skipped as u64);

        if items.is_empty() {
            report.outcome = Outcome::NoItems;
            *stage = Stage::Done;
            return Ok(());
        }

        // Oldest first. Stable, so same-instant items keep feed order.
        items.sort_by_key(|item| item.published_at());

        // One record per GUID: the oldest entry claims it.
        let before = items.len();
        let mut claimed = HashSet::new();
        items.retain(|item| {
            let first = claimed.insert(item.marker_guid());
            if !first {
                tracing::warn!(
                    guid = item.guid(),
                    published_at = %item.published_at(),
                    "dropping entry that repeats an earlier GUID in this feed"
                );
            }
            first
        });
        report.duplicates = before - items.len();

        // Deduplicating
        *stage = Stage::Deduplicating;
        let oldest_pending = items[0].timestamp();
        let scan = history::scan_published(
            self.ledger,
            feed.identity.public_key(),
            oldest_pending,
            self.options.scan_window,
            self.options.history_page_size,
            scope,
        )
        .await?;

        let before = items.len();
        items.retain(|item| !scan.seen.contains(&item.marker_guid()));
        report.already_published = before - items.len();
        counter!("feedstr_items_already_published_total")
            .increment(report.already_published as u64);

        if items.is_empty() {
            report.outcome = Outcome::UpToDate;
            *stage = Stage::Done;
            return Ok(());
        }

        // Publishing
        *stage = Stage::Publishing;
        for item in &items {
            scope.check("publish post")?;

            let event = feed.identity.sign(post_builder(item))?;

            if self.options.dry_run {
                tracing::info!(
                    guid = item.guid(),
                    published_at = %item.published_at(),
                    title = ?item.title(),
                    "dry run: would publish"
                );
                report.would_publish += 1;
                continue;
            }

            let id = scope.run("publish post", self.ledger.publish(&event)).await?;
            tracing::info!(
                guid = item.guid(),
                id = %id,
                published_at = %item.published_at(),
                "published item"
            );
            counter!("feedstr_items_published_total").increment(1);
            report.published.push(id);
        }

        report.outcome = Outcome::Published;
        *stage = Stage::Done;
        Ok(())
    }
}

/// Unsigned post record for an item.
pub fn post_builder(item: &SyncItem) -> EventBuilder {
    let mut tags = Vec::new();
    if let Some(title) = item.title() {
        tags.push(Tag::custom(TagKind::custom("subject"), [title]));
    }
    if let Some(link) = item.link() {
        tags.push(Tag::reference(link));
    }

    EventBuilder::text_note(item.content())
        .tags(tags)
        .custom_created_at(item.timestamp())
}
