//! HTTP feed source: fetches a feed document and parses it with `feed-rs`.
//!
//! RSS 0.9x/1.0/2.0, Atom and JSON Feed are all accepted. Parsed entries are
//! converted into the engine's own [`FeedEntry`] so nothing downstream sees
//! parser types.

use std::time::Duration;

use feed_rs::model::Entry;
use feedstr_core::{
    EntryLink, EntryText, Error as CoreError, FeedEntry, FeedSource, Result as CoreResult,
    TextKind,
};

use crate::Result;

/// Sent on every feed request.
pub const USER_AGENT: &str = concat!("feedstr/", env!("CARGO_PKG_VERSION"));

/// Feed source over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_document(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        tracing::debug!(url, bytes = body.len(), "fetched feed document");
        parse_feed(&body)
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> CoreResult<Vec<FeedEntry>> {
        self.fetch_document(url)
            .await
            .map_err(|e| CoreError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Parse a feed document into entries, in document order.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body)?;
    Ok(feed.entries.into_iter().map(convert_entry).collect())
}

fn text_kind(essence: &str) -> TextKind {
    match essence {
        "text/html" => TextKind::Html,
        "application/xhtml+xml" => TextKind::Xhtml,
        _ => TextKind::Plain,
    }
}

fn convert_entry(entry: Entry) -> FeedEntry {
    let id = Some(entry.id).filter(|id| !id.trim().is_empty());

    FeedEntry {
        id,
        published: entry.published,
        updated: entry.updated,
        title: entry.title.map(|t| EntryText {
            kind: text_kind(&t.content_type.essence().to_string()),
            content: t.content,
        }),
        content: entry.content.and_then(|c| c.body),
        summary: entry.summary.map(|t| t.content),
        links: entry
            .links
            .into_iter()
            .map(|l| EntryLink {
                href: l.href,
                rel: l.rel,
            })
            .collect(),
    }
}
