//! Configuration file parser for ~/.config/feedfold/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::HttpFetcherConfig;
use crate::util::validate_feed_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URLs to ingest every cycle.
    pub feeds: Vec<String>,

    /// Hours between cycles. 0 = run a single cycle and exit.
    pub fetch_interval_hours: u64,

    /// Where the store is persisted. `None` = `<config dir>/store.json`.
    pub store_path: Option<PathBuf>,

    /// Upper bound on simultaneous fetches.
    pub max_concurrent_fetches: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    pub user_agent: String,

    /// Permit localhost and private-network feed URLs.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            fetch_interval_hours: 1,
            store_path: None,
            max_concurrent_fetches: 10,
            request_timeout_secs: 30,
            user_agent: HttpFetcherConfig::default().user_agent,
            allow_private_hosts: false,
        }
    }
}

const KNOWN_KEYS: [&str; 7] = [
    "feeds",
    "fetch_interval_hours",
    "store_path",
    "max_concurrent_fetches",
    "request_timeout_secs",
    "user_agent",
    "allow_private_hosts",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a huge file is never pulled into memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            interval_hours = config.fetch_interval_hours,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse TOML text; blank text yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Configured feed URLs that pass validation, duplicates removed.
    ///
    /// Invalid entries are logged and skipped; order of first occurrence is kept.
    pub fn feed_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(self.feeds.len());

        for raw in &self.feeds {
            match validate_feed_url(raw.trim(), self.allow_private_hosts) {
                Ok(url) => {
                    let url = url.to_string();
                    if seen.insert(url.clone()) {
                        urls.push(url);
                    } else {
                        tracing::debug!(url = %url, "Duplicate feed URL in config, ignoring");
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "Invalid feed URL in config, skipping");
                }
            }
        }

        urls
    }

    /// Store location: the configured path, else `store.json` in `config_dir`.
    pub fn store_path(&self, config_dir: &Path) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| config_dir.join("store.json"))
    }

    /// Time between cycles, `None` for a single cycle.
    pub fn fetch_interval(&self) -> Option<Duration> {
        match self.fetch_interval_hours {
            0 => None,
            hours => Some(Duration::from_secs(hours.saturating_mul(3600))),
        }
    }

    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
            ..HttpFetcherConfig::default()
        }
    }
}

/// `~/.config/feedfold/`, or `None` when `HOME` is unset.
pub fn config_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("feedfold"))
}

// ============================================================================
// Tests
// ============================================================================
