//! Backward scan of an identity's published history.
//!
//! With no local database, the only record of what has been published is
//! the ledger itself. The scanner walks the identity's records newest first
//! and decodes the GUID marker out of every post, stopping as soon as records
//! fall more than the scan window behind the oldest item still pending. Per
//! run cost is therefore bounded by how much was published inside the
//! window, not by how long the identity has existed.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use metrics::counter;
use nostr::{EventId, PublicKey, Timestamp};

use crate::context::IoScope;
use crate::ledger::{Ledger, RecordHeader};
use crate::{Result, marker};

/// How far behind the oldest pending item the scan reaches.
///
/// Some sources re-emit an entry with only its modified date bumped, which
/// moves it around in time between runs; a week absorbs that drift.
pub const SCAN_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default number of headers requested per history page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound when widening a page to get past records sharing a timestamp.
const MAX_PAGE_SIZE: usize = 1000;

/// GUIDs already published within the scanned window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    guids: HashSet<String>,
}

impl SeenSet {
    pub fn contains(&self, guid: &str) -> bool {
        self.guids.contains(guid)
    }

    pub fn insert(&mut self, guid: String) -> bool {
        self.guids.insert(guid)
    }

    pub fn len(&self) -> usize {
        self.guids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }
}

/// Result of one history scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub seen: SeenSet,
    /// Headers examined, including the one that ended the scan.
    pub records_scanned: usize,
    /// Full records fetched for marker decoding.
    pub records_fetched: usize,
}

/// Lazily pages through an author's history, newest first.
///
/// Pages are only requested when the previous one has been consumed, so a
/// caller that stops early never pays for the rest of the history.
pub struct HistoryCursor<'a, L> {
    ledger: &'a L,
    author: PublicKey,
    page_size: usize,
    limit: usize,
    until: Option<Timestamp>,
    buffer: VecDeque<RecordHeader>,
    visited: HashSet<EventId>,
    exhausted: bool,
}

impl<'a, L: Ledger> HistoryCursor<'a, L> {
    pub fn new(ledger: &'a L, author: PublicKey, page_size: usize) -> Self {
        Self {
            ledger,
            author,
            page_size: page_size.max(1),
            limit: page_size.max(1),
            until: None,
            buffer: VecDeque::new(),
            visited: HashSet::new(),
            exhausted: false,
        }
    }

    /// The next older header, or `None` once history is exhausted.
    pub async fn next(&mut self, scope: &IoScope) -> Result<Option<RecordHeader>> {
        loop {
            if let Some(header) = self.buffer.pop_front() {
                return Ok(Some(header));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fill(scope).await?;
        }
    }

    async fn fill(&mut self, scope: &IoScope) -> Result<()> {
        let limit = self.limit;
        let mut page = scope
            .run(
                "read history page",
                self.ledger.history_page(&self.author, self.until, limit),
            )
            .await?;

        // Relays cap `limit` and cut pages short on timeouts, so a short page
        // says nothing about what lies below it. Only an empty one ends history.
        let Some(oldest) = page.iter().map(|h| h.created_at).min() else {
            self.exhausted = true;
            return Ok(());
        };
        let full_page = page.len() >= limit;

        // `until` is inclusive, so records sharing the oldest timestamp show up
        // again on the next page; skip the ones already handed out.
        page.retain(|h| self.visited.insert(h.id));
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if page.is_empty() {
            if full_page && limit < MAX_PAGE_SIZE {
                // A full page of one timestamp, all seen: widen the page to get past it.
                self.limit = (limit * 2).min(MAX_PAGE_SIZE);
            } else {
                match oldest.as_u64().checked_sub(1) {
                    Some(secs) => self.until = Some(Timestamp::from(secs)),
                    None => self.exhausted = true,
                }
            }
            return Ok(());
        }

        self.until = Some(oldest);
        self.limit = self.page_size;
        self.buffer.extend(page);
        Ok(())
    }
}

/// Collect the GUIDs `author` has already published.
///
/// Records older than `oldest_pending - window` end the scan. Only posts are
/// fetched and decoded; other record kinds are passed over.
pub async fn scan_published<L: Ledger>(
    ledger: &L,
    author: PublicKey,
    oldest_pending: Timestamp,
    window: Duration,
    page_size: usize,
    scope: &IoScope,
) -> Result<ScanResult> {
    let cutoff = oldest_pending.as_u64().saturating_sub(window.as_secs());
    let mut cursor = HistoryCursor::new(ledger, author, page_size);
    let mut result = ScanResult::default();

    while let Some(header) = cursor.next(scope).await? {
        result.records_scanned += 1;

        if header.created_at.as_u64() < cutoff {
            tracing::debug!(
                created_at = header.created_at.as_u64(),
                cutoff,
                "reached end of scan window"
            );
            break;
        }

        if !header.is_post() {
            continue;
        }

        let record = scope
            .run("fetch record", ledger.fetch_record(&header.id))
            .await?;
        result.records_fetched += 1;

        let Some(record) = record else {
            tracing::debug!(id = %header.id, "record listed in history but not retrievable");
            continue;
        };

        if let Some(guid) = marker::decode(&record.content) {
            result.seen.insert(guid);
        }
    }

    counter!("feedstr_history_records_scanned_total").increment(result.records_scanned as u64);

    tracing::debug!(
        scanned = result.records_scanned,
        fetched = result.records_fetched,
        seen = result.seen.len(),
        "history scan complete"
    );

    Ok(result)
}
