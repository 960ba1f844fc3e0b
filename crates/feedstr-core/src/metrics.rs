//! Prometheus metrics helpers.
//!
//! The sync binary is a batch job, so there is no `/metrics` endpoint: the
//! recorder is installed once at startup and its rendering written to a
//! textfile at the end of each batch, for a node exporter to pick up.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `feedstr_`
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - No per-feed labels; per-feed detail goes to the logs

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and register metric descriptions.
///
/// Returns `None` if a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

fn register_metrics() {
    describe_counter!(
        "feedstr_items_published_total",
        "Posts appended to the ledger"
    );
    describe_counter!(
        "feedstr_items_skipped_total",
        "Feed entries dropped for lacking a date or being invalid"
    );
    describe_counter!(
        "feedstr_items_already_published_total",
        "Items found in the history scan and not republished"
    );
    describe_counter!(
        "feedstr_history_records_scanned_total",
        "History headers examined while looking for GUID markers"
    );
    describe_counter!(
        "feedstr_feed_failures_total",
        "Feeds whose run aborted"
    );
    describe_counter!(
        "feedstr_profile_updates_total",
        "Profile records published"
    );
    describe_histogram!(
        "feedstr_batch_duration_seconds",
        "Wall time of one batch over all selected feeds"
    );
}
