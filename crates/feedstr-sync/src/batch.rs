//! Batch driver: runs every selected feed once, one after another.
//!
//! A feed that fails is logged, counted and recorded in the summary; the
//! batch then carries on with the next feed. Each feed runs in its own child
//! scope, so nothing it started outlives its turn.

use std::time::{Duration, Instant};

use feedstr_core::{
    FeedSource, FeedTarget, IoScope, Ledger, MarkupConverter, ProfileOutcome, ReconcileOptions,
    Reconciler, SyncReport, desired_profile, sync_profile,
};
use metrics::{counter, histogram};
use tracing::Instrument;

use crate::config::FeedConfig;

/// What a batch does besides reconciling.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub reconcile: ReconcileOptions,
    /// Leave feed profiles alone.
    pub skip_profiles: bool,
}

/// A feed that did not finish.
#[derive(Debug, Clone)]
pub struct FeedFailure {
    pub feed: String,
    /// `profile`, or the reconciliation stage that was reached.
    pub stage: String,
    /// Records appended before the failure.
    pub published: usize,
    pub error: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<SyncReport>,
    pub failures: Vec<FeedFailure>,
    pub profile_updates: usize,
    /// Feeds never started because the batch was interrupted.
    pub not_started: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Every selected feed ran to completion.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.not_started == 0
    }

    /// Records published across all feeds, including by failed ones.
    pub fn published(&self) -> usize {
        let ok: usize = self.reports.iter().map(|r| r.published.len()).sum();
        let partial: usize = self.failures.iter().map(|f| f.published).sum();
        ok + partial
    }

    pub fn would_publish(&self) -> usize {
        self.reports.iter().map(|r| r.would_publish).sum()
    }

    pub fn already_published(&self) -> usize {
        self.reports.iter().map(|r| r.already_published).sum()
    }

    /// Log an end-of-batch summary.
    pub fn log(&self) {
        tracing::info!("═══════════════════════════════════════════════════════");
        tracing::info!("BATCH COMPLETE");
        tracing::info!("═══════════════════════════════════════════════════════");
        tracing::info!("Feeds synced:         {}", self.reports.len());
        tracing::info!("Feeds failed:         {}", self.failures.len());
        if self.not_started > 0 {
            tracing::info!("Feeds not started:    {}", self.not_started);
        }
        tracing::info!("Items published:      {}", self.published());
        if self.would_publish() > 0 {
            tracing::info!("Items (dry run):      {}", self.would_publish());
        }
        tracing::info!("Already published:    {}", self.already_published());
        tracing::info!("Profiles updated:     {}", self.profile_updates);
        tracing::info!("Elapsed:              {:.1}s", self.elapsed.as_secs_f64());
        for failure in &self.failures {
            tracing::info!(
                "  FAILED {} while {}: {}",
                failure.feed,
                failure.stage,
                failure.error
            );
        }
        tracing::info!("═══════════════════════════════════════════════════════");
    }
}

/// Run `feeds` once, in order.
pub async fn run_batch<L, F, M>(
    ledger: &L,
    source: &F,
    converter: &M,
    feeds: &[&FeedConfig],
    options: &BatchOptions,
    scope: &IoScope,
) -> BatchSummary
where
    L: Ledger,
    F: FeedSource,
    M: MarkupConverter,
{
    let start = Instant::now();
    let reconciler = Reconciler::new(ledger, source, converter, options.reconcile.clone());
    let mut summary = BatchSummary::default();

    for (i, feed) in feeds.iter().enumerate() {
        if scope.is_cancelled() {
            summary.not_started = feeds.len() - i;
            tracing::warn!(remaining = summary.not_started, "batch interrupted");
            break;
        }

        let feed_scope = scope.child();
        let span = tracing::info_span!("feed", name = %feed.name);
        sync_feed(ledger, &reconciler, feed, options, &feed_scope, &mut summary)
            .instrument(span)
            .await;
    }

    summary.elapsed = start.elapsed();
    histogram!("feedstr_batch_duration_seconds").record(summary.elapsed.as_secs_f64());
    summary
}

async fn sync_feed<L, F, M>(
    ledger: &L,
    reconciler: &Reconciler<'_, L, F, M>,
    feed: &FeedConfig,
    options: &BatchOptions,
    scope: &IoScope,
    summary: &mut BatchSummary,
) where
    L: Ledger,
    F: FeedSource,
    M: MarkupConverter,
{
    if !options.skip_profiles {
        let desired = desired_profile(&feed.name, &feed.url);
        let dry_run = options.reconcile.dry_run;
        match sync_profile(ledger, &feed.identity, &desired, dry_run, scope).await {
            Ok(ProfileOutcome::Updated(_)) => summary.profile_updates += 1,
            Ok(ProfileOutcome::Unchanged | ProfileOutcome::WouldUpdate) => {}
            Err(e) => {
                tracing::error!(error = %e, "profile sync failed");
                counter!("feedstr_feed_failures_total").increment(1);
                summary.failures.push(FeedFailure {
                    feed: feed.name.clone(),
                    stage: "profile".to_string(),
                    published: 0,
                    error: e.to_string(),
                });
                return;
            }
        }
    }

    let target = FeedTarget {
        name: &feed.name,
        url: &feed.url,
        identity: &feed.identity,
    };

    match reconciler.reconcile(&target, scope).await {
        Ok(report) => summary.reports.push(report),
        Err(aborted) => {
            tracing::error!(
                stage = %aborted.stage,
                published = aborted.published,
                error = %aborted.source,
                "feed aborted"
            );
            counter!("feedstr_feed_failures_total").increment(1);
            summary.failures.push(FeedFailure {
                feed: aborted.feed,
                stage: aborted.stage.to_string(),
                published: aborted.published,
                error: aborted.source.to_string(),
            });
        }
    }
}
