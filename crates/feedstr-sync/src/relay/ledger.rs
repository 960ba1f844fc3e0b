//! The ledger, backed by a set of Nostr relays.
//!
//! History pages come back as full events, so the ones a page returns are
//! kept until the scanner asks for them by id. Only records that have since
//! dropped out of that cache are fetched again.

use std::collections::HashMap;
use std::time::Duration;

use feedstr_core::{Error as CoreError, Ledger, RecordHeader, Result as CoreResult};
use nostr_sdk::prelude::*;
use parking_lot::Mutex;

use crate::Result;

/// A ledger client over a connected nostr-sdk [`Client`].
pub struct RelayLedger {
    client: Client,
    fetch_timeout: Duration,
    cache: Mutex<HashMap<EventId, Event>>,
}

impl RelayLedger {
    /// Add and connect to the given (already normalized) relays.
    ///
    /// `fetch_timeout` bounds how long a query waits for relays to finish
    /// sending stored events; whatever arrived by then is the answer.
    pub async fn connect(relays: &[String], fetch_timeout: Duration) -> Result<Self> {
        let client = Client::default();

        for relay_url in relays {
            client.add_relay(relay_url).await?;
            tracing::debug!("Added relay: {}", relay_url);
        }

        client.connect().await;

        // Wait a bit for connections to establish
        tokio::time::sleep(Duration::from_secs(2)).await;

        let connected = client
            .relays()
            .await
            .values()
            .filter(|relay| relay.status() == RelayStatus::Connected)
            .count();
        if connected == 0 {
            tracing::warn!("No relays connected yet; publishing will retry on demand");
        } else {
            tracing::info!("Connected to {}/{} relays", connected, relays.len());
        }

        Ok(Self {
            client,
            fetch_timeout,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    async fn query(&self, filter: Filter) -> CoreResult<Vec<Event>> {
        let events = self
            .client
            .fetch_events(filter, self.fetch_timeout)
            .await
            .map_err(ledger_error)?;
        Ok(events.into_iter().collect())
    }
}

fn ledger_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Ledger(e.to_string())
}

impl Ledger for RelayLedger {
    async fn publish(&self, event: &Event) -> CoreResult<EventId> {
        let output = self.client.send_event(event).await.map_err(ledger_error)?;

        for (relay, reason) in &output.failed {
            tracing::debug!(relay = %relay, reason = %reason, "relay rejected event");
        }

        if output.success.is_empty() {
            let reasons: Vec<String> = output
                .failed
                .iter()
                .map(|(relay, reason)| format!("{relay}: {reason}"))
                .collect();
            return Err(CoreError::Ledger(format!(
                "no relay accepted event {}: {}",
                output.val,
                reasons.join("; ")
            )));
        }

        Ok(output.val)
    }

    async fn profile(&self, author: &PublicKey) -> CoreResult<Option<Metadata>> {
        let filter = Filter::new().author(*author).kind(Kind::Metadata);
        let events = self.query(filter).await?;

        let Some(latest) = events.into_iter().max_by_key(|e| e.created_at) else {
            return Ok(None);
        };

        match Metadata::from_json(&latest.content) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                // A profile we cannot read gets replaced on the next update.
                tracing::warn!(id = %latest.id, error = %e, "ignoring malformed profile");
                Ok(None)
            }
        }
    }

    async fn history_page(
        &self,
        author: &PublicKey,
        until: Option<Timestamp>,
        limit: usize,
    ) -> CoreResult<Vec<RecordHeader>> {
        let mut filter = Filter::new().author(*author).limit(limit);
        if let Some(until) = until {
            filter = filter.until(until);
        }

        let mut events = self.query(filter).await?;
        // Several relays answer together; keep the page newest first and
        // no longer than asked for.
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        events.truncate(limit);

        let headers = events.iter().map(RecordHeader::of).collect();

        let mut cache = self.cache.lock();
        if until.is_none() {
            // A scan starting from the head; nothing older is still wanted.
            cache.clear();
        }
        cache.extend(events.into_iter().map(|e| (e.id, e)));

        Ok(headers)
    }

    async fn fetch_record(&self, id: &EventId) -> CoreResult<Option<Event>> {
        let cached = self.cache.lock().remove(id);
        if let Some(event) = cached {
            return Ok(Some(event));
        }

        let filter = Filter::new().id(*id).limit(1);
        let events = self.query(filter).await?;
        Ok(events.into_iter().next())
    }
}
