//! Ledger-side collaborators: the relay client contract and publishing
//! identities.

use std::fmt;
use std::future::Future;

use nostr::{Event, EventBuilder, EventId, Keys, Kind, Metadata, PublicKey, Timestamp};

use crate::Result;

/// Header of one record in an identity's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: EventId,
    pub kind: Kind,
    pub created_at: Timestamp,
}

impl RecordHeader {
    pub fn of(event: &Event) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            created_at: event.created_at,
        }
    }

    /// Whether the record is a post that may carry a marker.
    pub fn is_post(&self) -> bool {
        self.kind == Kind::TextNote
    }
}

/// Read and append access to the signed record store.
///
/// Records are never mutated or deleted through this interface.
pub trait Ledger {
    /// Submit a signed record. Resolves once the ledger has acknowledged it.
    fn publish(&self, event: &Event) -> impl Future<Output = Result<EventId>> + Send;

    /// The author's current profile, if one has been published.
    fn profile(&self, author: &PublicKey) -> impl Future<Output = Result<Option<Metadata>>> + Send;

    /// One page of the author's history, newest first.
    ///
    /// Returns at most `limit` headers with `created_at <= until` (or from
    /// "now" when `until` is `None`). A page may hold fewer than `limit`
    /// headers even when older ones exist; only an empty page means history
    /// is exhausted.
    fn history_page(
        &self,
        author: &PublicKey,
        until: Option<Timestamp>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RecordHeader>>> + Send;

    /// Fetch the full record a header points to.
    fn fetch_record(&self, id: &EventId) -> impl Future<Output = Result<Option<Event>>> + Send;
}

/// A publishing identity: one keypair, owned by exactly one feed.
#[derive(Clone)]
pub struct Identity {
    keys: Keys,
}

impl Identity {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Stable public identifier.
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Sign an unsigned record.
    pub fn sign(&self, builder: EventBuilder) -> Result<Event> {
        Ok(builder.sign_with_keys(&self.keys)?)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half.
        f.debug_struct("Identity")
            .field("public_key", &self.public_key().to_hex())
            .finish()
    }
}
