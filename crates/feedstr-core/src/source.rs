//! Feed-side collaborators: the raw entry shape, feed sources, and the
//! body-to-markup converter.
//!
//! The engine never touches a feed parser directly. Adapters (HTTP + parser,
//! or an in-memory list in tests) hand it [`FeedEntry`] values.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::Result;

/// How a text field is encoded in the source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextKind {
    /// Plain text, used as-is.
    #[default]
    Plain,
    /// Escaped HTML.
    Html,
    /// Inline XHTML.
    Xhtml,
}

impl TextKind {
    /// Whether the text may carry HTML entities that need decoding.
    pub fn is_html(self) -> bool {
        matches!(self, Self::Html | Self::Xhtml)
    }
}

/// A text field together with its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryText {
    pub content: String,
    pub kind: TextKind,
}

impl EntryText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: TextKind::Plain,
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: TextKind::Html,
        }
    }
}

/// A link attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    pub href: String,
    /// Link relation (`alternate`, `enclosure`, ...), if declared.
    pub rel: Option<String>,
}

/// One raw entry as exposed by a parsed feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// The entry's GUID / Atom id.
    pub id: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// Last-modified date, used when `published` is missing.
    pub updated: Option<DateTime<Utc>>,
    pub title: Option<EntryText>,
    /// Full rich content body.
    pub content: Option<String>,
    /// Short description, used when there is no full content.
    pub summary: Option<String>,
    pub links: Vec<EntryLink>,
}

impl FeedEntry {
    /// The entry's canonical URL.
    ///
    /// The first link with no relation or `rel="alternate"`, falling back to
    /// the first link of any kind.
    pub fn canonical_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.first())
            .map(|l| l.href.as_str())
            .filter(|href| !href.trim().is_empty())
    }
}

/// Retrieves and parses a feed document.
pub trait FeedSource {
    /// Fetch the feed at `url`, returning its entries in document order.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<FeedEntry>>> + Send;
}

/// Converts a rich-text (HTML) body into the markup used in posts.
///
/// Implementations must not fail: on malformed input they degrade to
/// whatever best-effort text they can produce.
pub trait MarkupConverter {
    fn convert(&self, html: Option<&str>) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(href: &str, rel: Option<&str>) -> EntryLink {
        EntryLink {
            href: href.to_string(),
            rel: rel.map(str::to_string),
        }
    }

    #[test]
    fn canonical_link_prefers_alternate() {
        let entry = FeedEntry {
            links: vec![
                link("https://cdn.example.com/a.mp3", Some("enclosure")),
                link("https://example.com/a", Some("alternate")),
            ],
            ..Default::default()
        };
        assert_eq!(entry.canonical_link(), Some("https://example.com/a"));
    }

    #[test]
    fn canonical_link_accepts_missing_rel() {
        let entry = FeedEntry {
            links: vec![
                link("https://example.com/replies", Some("replies")),
                link("https://example.com/b", None),
            ],
            ..Default::default()
        };
        assert_eq!(entry.canonical_link(), Some("https://example.com/b"));
    }

    #[test]
    fn canonical_link_falls_back_to_first() {
        let entry = FeedEntry {
            links: vec![link("https://example.com/c", Some("related"))],
            ..Default::default()
        };
        assert_eq!(entry.canonical_link(), Some("https://example.com/c"));
        assert_eq!(FeedEntry::default().canonical_link(), None);
    }

    #[test]
    fn text_kind_html_detection() {
        assert!(TextKind::Html.is_html());
        assert!(TextKind::Xhtml.is_html());
        assert!(!TextKind::Plain.is_html());
    }
}
