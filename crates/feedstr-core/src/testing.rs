//! In-memory collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use nostr::{Event, EventId, JsonUtil, Kind, Metadata, PublicKey, Timestamp};
use parking_lot::Mutex;

use crate::ledger::{Ledger, RecordHeader};
use crate::source::{EntryLink, EntryText, FeedEntry, FeedSource, MarkupConverter};
use crate::{Error, Result};

/// A ledger held in memory, with relay-like query semantics.
#[derive(Default)]
pub struct MemoryLedger {
    events: Mutex<Vec<Event>>,
    published: Mutex<Vec<Event>>,
    fail_after: Mutex<Option<usize>>,
    page_cap: Mutex<Option<usize>>,
    history_requests: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if published by an earlier run.
    pub fn insert(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Make every publish after the first `n` successful ones fail.
    pub fn fail_publishes_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }

    /// Let publishes succeed again.
    pub fn heal(&self) {
        *self.fail_after.lock() = None;
    }

    /// Records published through [`Ledger::publish`], in submission order.
    pub fn published(&self) -> Vec<Event> {
        self.published.lock().clone()
    }

    pub fn history_requests(&self) -> usize {
        self.history_requests.load(Ordering::Relaxed)
    }

    /// Serve at most `cap` headers per history page, whatever the caller asks for.
    pub fn cap_history_pages(&self, cap: usize) {
        *self.page_cap.lock() = Some(cap);
    }

    fn accept(&self, event: &Event) -> Result<EventId> {
        let mut published = self.published.lock();
        if let Some(limit) = *self.fail_after.lock()
            && published.len() >= limit
        {
            return Err(Error::Ledger("relay rejected event".to_string()));
        }
        published.push(event.clone());
        self.events.lock().push(event.clone());
        Ok(event.id)
    }
}

impl Ledger for MemoryLedger {
    async fn publish(&self, event: &Event) -> Result<EventId> {
        self.accept(event)
    }

    async fn profile(&self, author: &PublicKey) -> Result<Option<Metadata>> {
        let latest = self
            .events
            .lock()
            .iter()
            .filter(|e| e.pubkey == *author && e.kind == Kind::Metadata)
            .max_by_key(|e| e.created_at)
            .cloned();
        match latest {
            Some(event) => Metadata::from_json(&event.content)
                .map(Some)
                .map_err(|e| Error::Ledger(format!("malformed profile: {e}"))),
            None => Ok(None),
        }
    }

    async fn history_page(
        &self,
        author: &PublicKey,
        until: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<RecordHeader>> {
        self.history_requests.fetch_add(1, Ordering::Relaxed);
        let mut headers: Vec<RecordHeader> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.pubkey == *author)
            .filter(|e| until.is_none_or(|u| e.created_at <= u))
            .map(RecordHeader::of)
            .collect();
        headers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let cap = *self.page_cap.lock();
        headers.truncate(cap.map_or(limit, |cap| cap.min(limit)));
        Ok(headers)
    }

    async fn fetch_record(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self.events.lock().iter().find(|e| e.id == *id).cloned())
    }
}

/// A feed whose entries are set directly.
#[derive(Default)]
pub struct StaticFeed {
    entries: Vec<FeedEntry>,
    fetches: AtomicUsize,
}

impl StaticFeed {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            entries,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl FeedSource for StaticFeed {
    async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.clone())
    }
}

/// A feed source that always fails.
pub struct BrokenFeed;

impl FeedSource for BrokenFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        Err(Error::Fetch {
            url: url.to_string(),
            reason: "HTTP 503 Service Unavailable".to_string(),
        })
    }
}

/// Returns the body unchanged.
pub struct PassThrough;

impl MarkupConverter for PassThrough {
    fn convert(&self, html: Option<&str>) -> String {
        html.unwrap_or_default().to_string()
    }
}

/// A dated entry with a GUID, a title and a link.
pub fn entry(guid: &str, published_secs: i64) -> FeedEntry {
    FeedEntry {
        id: Some(guid.to_string()),
        published: Some(at(published_secs)),
        title: Some(EntryText::plain(format!("Post {guid}"))),
        content: Some(format!("<p>Body of {guid}</p>")),
        links: vec![EntryLink {
            href: format!("https://example.com/{guid}"),
            rel: None,
        }],
        ..Default::default()
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// GUIDs decoded from the given records, in order.
pub fn guids(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| crate::marker::decode(&e.content))
        .collect()
}

/// Formatted log output collected by [`capture_logs`].
#[cfg(test)]
#[derive(Clone, Default)]
pub struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's log events into a buffer until the guard drops.
#[cfg(test)]
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
