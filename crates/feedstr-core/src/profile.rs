//! Keeps each feed identity's published profile in line with its config.

use metrics::counter;
use nostr::{EventBuilder, EventId, Metadata};

use crate::context::IoScope;
use crate::ledger::{Identity, Ledger};
use crate::Result;

/// The profile a feed's identity should carry.
pub fn desired_profile(name: &str, source_url: &str) -> Metadata {
    Metadata::new()
        .name(name)
        .display_name(name)
        .about(format!("Automated mirror of {source_url}"))
}

/// What [`sync_profile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// The published profile already matches.
    Unchanged,
    /// A new profile record was published.
    Updated(EventId),
    /// A new profile is needed but the run is a dry run.
    WouldUpdate,
}

fn same_profile(current: &Metadata, desired: &Metadata) -> bool {
    let display_name = |m: &Metadata| m.display_name.clone().or_else(|| m.name.clone());
    display_name(current) == display_name(desired) && current.about == desired.about
}

/// Publish `desired` for `identity` unless its current profile already has
/// the same display name and description.
pub async fn sync_profile<L: Ledger>(
    ledger: &L,
    identity: &Identity,
    desired: &Metadata,
    dry_run: bool,
    scope: &IoScope,
) -> Result<ProfileOutcome> {
    let author = identity.public_key();
    let current = scope.run("read profile", ledger.profile(&author)).await?;

    if let Some(current) = &current
        && same_profile(current, desired)
    {
        tracing::debug!("profile up to date");
        return Ok(ProfileOutcome::Unchanged);
    }

    if dry_run {
        tracing::info!(name = ?desired.name, "dry run: would update profile");
        return Ok(ProfileOutcome::WouldUpdate);
    }

    let event = identity.sign(EventBuilder::metadata(desired))?;
    let id = scope.run("publish profile", ledger.publish(&event)).await?;
    counter!("feedstr_profile_updates_total").increment(1);
    tracing::info!(id = %id, name = ?desired.name, "published profile");

    Ok(ProfileOutcome::Updated(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLedger;
    use nostr::{Keys, Kind};

    #[test]
    fn desired_profile_is_deterministic() {
        let a = desired_profile("Example Blog", "https://example.com/feed.xml");
        let b = desired_profile("Example Blog", "https://example.com/feed.xml");
        assert_eq!(a, b);
        assert_eq!(a.display_name.as_deref(), Some("Example Blog"));
        assert_eq!(
            a.about.as_deref(),
            Some("Automated mirror of https://example.com/feed.xml")
        );
    }

    #[tokio::test]
    async fn publishes_when_no_profile_exists() {
        let ledger = MemoryLedger::new();
        let identity = Identity::new(Keys::generate());
        let desired = desired_profile("Blog", "https://example.com/feed");

        let outcome = sync_profile(&ledger, &identity, &desired, false, &IoScope::default())
            .await
            .unwrap();

        assert!(matches!(outcome, ProfileOutcome::Updated(_)));
        let published = ledger.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].kind, Kind::Metadata);
        assert_eq!(
            ledger.profile(&identity.public_key()).await.unwrap(),
            Some(desired)
        );
    }

    #[tokio::test]
    async fn second_sync_is_a_noop() {
        let ledger = MemoryLedger::new();
        let identity = Identity::new(Keys::generate());
        let desired = desired_profile("Blog", "https://example.com/feed");
        let scope = IoScope::default();

        sync_profile(&ledger, &identity, &desired, false, &scope)
            .await
            .unwrap();
        let outcome = sync_profile(&ledger, &identity, &desired, false, &scope)
            .await
            .unwrap();

        assert_eq!(outcome, ProfileOutcome::Unchanged);
        assert_eq!(ledger.published().len(), 1);
    }

    #[tokio::test]
    async fn extra_fields_do_not_force_an_update() {
        let ledger = MemoryLedger::new();
        let identity = Identity::new(Keys::generate());
        let desired = desired_profile("Blog", "https://example.com/feed");
        let existing = desired.clone().lud16("blog@example.com");
        ledger.insert(identity.sign(EventBuilder::metadata(&existing)).unwrap());

        let outcome = sync_profile(&ledger, &identity, &desired, false, &IoScope::default())
            .await
            .unwrap();

        assert_eq!(outcome, ProfileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn changed_description_triggers_update() {
        let ledger = MemoryLedger::new();
        let identity = Identity::new(Keys::generate());
        let old = desired_profile("Blog", "https://old.example.com/feed");
        ledger.insert(identity.sign(EventBuilder::metadata(&old)).unwrap());
        let desired = desired_profile("Blog", "https://example.com/feed");

        let outcome = sync_profile(&ledger, &identity, &desired, false, &IoScope::default())
            .await
            .unwrap();

        assert!(matches!(outcome, ProfileOutcome::Updated(_)));
    }

    #[tokio::test]
    async fn dry_run_does_not_publish() {
        let ledger = MemoryLedger::new();
        let identity = Identity::new(Keys::generate());
        let desired = desired_profile("Blog", "https://example.com/feed");

        let outcome = sync_profile(&ledger, &identity, &desired, true, &IoScope::default())
            .await
            .unwrap();

        assert_eq!(outcome, ProfileOutcome::WouldUpdate);
        assert!(ledger.published().is_empty());
    }
}
