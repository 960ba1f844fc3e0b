//! Relay connectivity: URL normalization and the relay-backed ledger.

mod ledger;
pub mod url;

pub use ledger::RelayLedger;
pub use url::{NormalizeResult, normalize_relay_url, normalize_relay_urls};
