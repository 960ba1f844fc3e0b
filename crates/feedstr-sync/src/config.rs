//! Configuration loaded from a TOML file.
//!
//! ```toml
//! relays = ["wss://relay.damus.io", "wss://nos.lol"]
//! request_timeout_secs = 30
//! history_page_size = 50
//!
//! [[feeds]]
//! name = "Example Blog"
//! url = "https://example.com/feed.xml"
//! pubkey = "npub1..."                  # optional, checked against the secret
//! secret_key_env = "EXAMPLE_BLOG_NSEC" # or: secret_key = "nsec1..."
//! ```
//!
//! Everything is validated up front, so a feed that would fail on identity or
//! URL grounds never reaches the engine.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use feedstr_core::Identity;
use feedstr_core::context::DEFAULT_REQUEST_TIMEOUT;
use feedstr_core::history::DEFAULT_PAGE_SIZE;
use nostr::{Keys, PublicKey};
use serde::Deserialize;

use crate::relay::normalize_relay_urls;
use crate::{Error, Result};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "feedstr.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    relays: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_history_page_size")]
    history_page_size: usize,
    #[serde(default)]
    feeds: Vec<RawFeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeed {
    name: String,
    url: String,
    pubkey: Option<String>,
    secret_key: Option<String>,
    secret_key_env: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_history_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// One feed and the identity that publishes it.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub identity: Identity,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized, deduplicated relay URLs.
    pub relays: Vec<String>,
    /// Timeout for a single feed or relay request.
    pub request_timeout: Duration,
    /// Headers requested per history page.
    pub history_page_size: usize,
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load and validate the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parse and validate a config document.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        if raw.relays.is_empty() {
            return Err(Error::Config("at least one relay is required".to_string()));
        }
        let relays = normalize_relay_urls(&raw.relays)
            .map_err(|e| Error::Config(format!("invalid relay URL {e}")))?;

        if raw.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if raw.history_page_size == 0 {
            return Err(Error::Config(
                "history_page_size must be greater than zero".to_string(),
            ));
        }
        if raw.feeds.is_empty() {
            return Err(Error::Config("no feeds configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut owners: HashMap<PublicKey, String> = HashMap::new();
        let mut feeds = Vec::with_capacity(raw.feeds.len());

        for feed in raw.feeds {
            let name = feed.name.trim().to_string();
            if name.is_empty() {
                return Err(Error::Config("feed name must not be empty".to_string()));
            }
            if !names.insert(name.clone()) {
                return Err(Error::Config(format!("duplicate feed name {name:?}")));
            }

            let url = feed.url.trim().to_string();
            validate_feed_url(&url)
                .map_err(|reason| Error::Config(format!("feed {name:?}: {reason}")))?;

            let keys = resolve_keys(&feed)
                .map_err(|e| Error::Config(format!("feed {name:?}: {e}")))?;

            if let Some(pubkey) = &feed.pubkey {
                let expected = PublicKey::parse(pubkey.trim())
                    .map_err(|e| Error::Config(format!("feed {name:?}: invalid pubkey: {e}")))?;
                if expected != keys.public_key() {
                    return Err(Error::Config(format!(
                        "feed {name:?}: pubkey does not match secret key"
                    )));
                }
            }

            if let Some(other) = owners.insert(keys.public_key(), name.clone()) {
                return Err(Error::Config(format!(
                    "feeds {other:?} and {name:?} share an identity"
                )));
            }

            feeds.push(FeedConfig {
                name,
                url,
                identity: Identity::new(keys),
            });
        }

        Ok(Self {
            relays,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            history_page_size: raw.history_page_size,
            feeds,
        })
    }

    /// Feeds to run: all of them, or only those named.
    ///
    /// Naming a feed that is not configured is an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<&FeedConfig>> {
        if names.is_empty() {
            return Ok(self.feeds.iter().collect());
        }

        for name in names {
            if !self.feeds.iter().any(|f| &f.name == name) {
                return Err(Error::Config(format!("unknown feed {name:?}")));
            }
        }

        Ok(self
            .feeds
            .iter()
            .filter(|f| names.contains(&f.name))
            .collect())
    }
}

fn validate_feed_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid feed URL {raw:?}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("feed URL must be http or https, got {other}")),
    }
}

fn resolve_keys(feed: &RawFeed) -> Result<Keys> {
    let secret = match (&feed.secret_key, &feed.secret_key_env) {
        (Some(secret), None) => secret.clone(),
        (None, Some(var)) => std::env::var(var)
            .map_err(|_| Error::Config(format!("environment variable {var} is not set")))?,
        (Some(_), Some(_)) => {
            return Err(Error::Config(
                "set only one of secret_key and secret_key_env".to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::Config(
                "one of secret_key or secret_key_env is required".to_string(),
            ));
        }
    };

    Ok(Keys::parse(secret.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::nips::nip19::ToBech32;
    use std::io::Write;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const SECRET_VAR: &str = "FEEDSTR_TEST_SECRET";

    /// Helper to run config tests with an isolated secret env var.
    fn with_secret_env<F: FnOnce()>(value: Option<&str>, f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = std::env::var(SECRET_VAR).ok();

        // SAFETY: Serialized by mutex; only test code touches this var.
        unsafe {
            match value {
                Some(v) => std::env::set_var(SECRET_VAR, v),
                None => std::env::remove_var(SECRET_VAR),
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            match saved {
                Some(v) => std::env::set_var(SECRET_VAR, v),
                None => std::env::remove_var(SECRET_VAR),
            }
        }
    }

    fn feed_block(name: &str, keys: &Keys) -> String {
        format!(
            "[[feeds]]\nname = \"{name}\"\nurl = \"https://example.com/{name}.xml\"\nsecret_key = \"{}\"\n",
            keys.secret_key().to_secret_hex()
        )
    }

    fn config_with(feeds: &str) -> String {
        format!("relays = [\"wss://relay.example.com/\"]\n\n{feeds}")
    }

    #[test]
    fn config_defaults() {
        let keys = Keys::generate();
        let config = Config::parse(&config_with(&feed_block("blog", &keys))).unwrap();

        assert_eq!(config.relays, vec!["wss://relay.example.com"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].name, "blog");
        assert_eq!(config.feeds[0].identity.public_key(), keys.public_key());
    }

    #[test]
    fn config_custom_values() {
        let keys = Keys::generate();
        let text = format!(
            "relays = [\"wss://a.example.com\", \"wss://A.example.com/\", \"wss://b.example.com\"]\nrequest_timeout_secs = 10\nhistory_page_size = 20\n\n{}",
            feed_block("blog", &keys)
        );
        let config = Config::parse(&text).unwrap();

        assert_eq!(
            config.relays,
            vec!["wss://a.example.com", "wss://b.example.com"]
        );
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.history_page_size, 20);
    }

    #[test]
    fn load_from_file() {
        let keys = Keys::generate();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config_with(&feed_block("blog", &keys)).as_bytes())
            .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.feeds[0].url, "https://example.com/blog.xml");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn malformed_toml_is_toml_error() {
        let err = Config::parse("relays = [").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn requires_a_relay() {
        let keys = Keys::generate();
        let text = format!("relays = []\n{}", feed_block("blog", &keys));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("relay"));
    }

    #[test]
    fn rejects_non_websocket_relay() {
        let keys = Keys::generate();
        let text = format!(
            "relays = [\"https://relay.example.com\"]\n{}",
            feed_block("blog", &keys)
        );
        assert!(matches!(Config::parse(&text), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_duplicate_names() {
        let text = config_with(&format!(
            "{}\n{}",
            feed_block("blog", &Keys::generate()),
            feed_block("blog", &Keys::generate())
        ));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("duplicate feed name"));
    }

    #[test]
    fn rejects_shared_identity() {
        let keys = Keys::generate();
        let text = config_with(&format!(
            "{}\n{}",
            feed_block("one", &keys),
            feed_block("two", &keys)
        ));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("share an identity"));
    }

    #[test]
    fn rejects_non_http_feed_url() {
        let keys = Keys::generate();
        let text = config_with(&format!(
            "[[feeds]]\nname = \"ftp\"\nurl = \"ftp://example.com/feed\"\nsecret_key = \"{}\"\n",
            keys.secret_key().to_secret_hex()
        ));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn pubkey_must_match_secret() {
        let keys = Keys::generate();
        let other = Keys::generate();
        let text = config_with(&format!(
            "{}pubkey = \"{}\"\n",
            feed_block("blog", &keys),
            other.public_key().to_hex()
        ));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn accepts_matching_npub_and_nsec() {
        let keys = Keys::generate();
        let text = config_with(&format!(
            "[[feeds]]\nname = \"blog\"\nurl = \"https://example.com/feed\"\npubkey = \"{}\"\nsecret_key = \"{}\"\n",
            keys.public_key().to_bech32().unwrap(),
            keys.secret_key().to_bech32().unwrap()
        ));
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.feeds[0].identity.public_key(), keys.public_key());
    }

    #[test]
    fn invalid_secret_is_rejected() {
        let text = config_with(
            "[[feeds]]\nname = \"blog\"\nurl = \"https://example.com/feed\"\nsecret_key = \"not-a-key\"\n",
        );
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("blog"));
    }

    #[test]
    fn secret_from_env() {
        let keys = Keys::generate();
        let text = config_with(&format!(
            "[[feeds]]\nname = \"blog\"\nurl = \"https://example.com/feed\"\nsecret_key_env = \"{SECRET_VAR}\"\n"
        ));
        with_secret_env(Some(&keys.secret_key().to_secret_hex()), || {
            let config = Config::parse(&text).unwrap();
            assert_eq!(config.feeds[0].identity.public_key(), keys.public_key());
        });
    }

    #[test]
    fn unset_secret_env_is_rejected() {
        let text = config_with(&format!(
            "[[feeds]]\nname = \"blog\"\nurl = \"https://example.com/feed\"\nsecret_key_env = \"{SECRET_VAR}\"\n"
        ));
        with_secret_env(None, || {
            let err = Config::parse(&text).unwrap_err();
            assert!(err.to_string().contains(SECRET_VAR));
        });
    }

    #[test]
    fn both_secret_sources_is_rejected() {
        let keys = Keys::generate();
        let text = config_with(&format!(
            "{}secret_key_env = \"{SECRET_VAR}\"\n",
            feed_block("blog", &keys)
        ));
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("only one"));
    }

    #[test]
    fn select_filters_by_name() {
        let text = config_with(&format!(
            "{}\n{}",
            feed_block("one", &Keys::generate()),
            feed_block("two", &Keys::generate())
        ));
        let config = Config::parse(&text).unwrap();

        assert_eq!(config.select(&[]).unwrap().len(), 2);
        let picked = config.select(&["two".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "two");
        assert!(matches!(
            config.select(&["three".to_string()]),
            Err(Error::Config(_))
        ));
    }
}
