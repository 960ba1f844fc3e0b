//! Canonical items built from raw feed entries.

use chrono::{DateTime, Utc};
use nostr::Timestamp;

use crate::marker;
use crate::source::{FeedEntry, MarkupConverter};
use crate::{Error, Result};

/// Identifier used for entries that carry no usable id.
///
/// All such entries share it, so duplicate detection for them is best-effort.
pub const MISSING_GUID: &str = "missing-guid";

/// One feed entry, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    guid: String,
    title: Option<String>,
    body: String,
    link: Option<String>,
    published_at: DateTime<Utc>,
}

impl SyncItem {
    /// Build an item. Fails when `published_at` is not after the epoch, which
    /// only happens when an upstream date failed to parse.
    pub fn new(
        guid: impl Into<String>,
        title: Option<String>,
        body: impl Into<String>,
        link: Option<String>,
        published_at: DateTime<Utc>,
    ) -> Result<Self> {
        let guid = guid.into();
        match published_at.timestamp() {
            0 => {
                return Err(Error::InvalidItem(format!(
                    "entry {guid:?} has an epoch publish timestamp"
                )));
            }
            secs if secs < 0 => {
                return Err(Error::InvalidItem(format!(
                    "entry {guid:?} is dated before the epoch ({published_at})"
                )));
            }
            _ => {}
        }

        Ok(Self {
            guid,
            title,
            body: body.into(),
            link,
            published_at,
        })
    }

    /// The identifier from the source feed, as embedded in the marker.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// The identifier as it reads back out of a published marker.
    pub fn marker_guid(&self) -> String {
        marker::normalize_guid(&self.guid)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Rendered body, including the backlink and trailing marker.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The entry's canonical URL.
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Publish time as a Nostr timestamp.
    pub fn timestamp(&self) -> Timestamp {
        // `new` guarantees a positive value.
        Timestamp::from(self.published_at.timestamp() as u64)
    }

    /// Post content: the title (if any) followed by the body.
    pub fn content(&self) -> String {
        match &self.title {
            Some(title) => format!("{title}\n\n{}", self.body),
            None => self.body.clone(),
        }
    }
}

/// Turn a raw entry into a [`SyncItem`].
///
/// Returns `Ok(None)` when the entry has neither a published nor a modified
/// date; such entries are skipped rather than treated as failures.
pub fn normalize<M>(entry: &FeedEntry, converter: &M) -> Result<Option<SyncItem>>
where
    M: MarkupConverter + ?Sized,
{
    let Some(published_at) = entry.published.or(entry.updated) else {
        return Ok(None);
    };

    let guid = entry
        .id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(MISSING_GUID);

    let title = entry.title.as_ref().and_then(|t| {
        let text = if t.kind.is_html() {
            html_escape::decode_html_entities(&t.content).into_owned()
        } else {
            t.content.clone()
        };
        (!text.trim().is_empty()).then_some(text)
    });

    let raw = entry.content.as_deref().or(entry.summary.as_deref());
    let mut body = converter.convert(raw);

    let link = entry.canonical_link().map(str::to_string);
    if let Some(url) = &link
        && !body.contains(url.as_str())
    {
        body = format!("{}\n\n[Continue reading]({url})", body.trim_end())
            .trim_start()
            .to_string();
    }

    let body = marker::encode(&body, guid);

    SyncItem::new(guid, title, body, link, published_at).map(Some)
}
