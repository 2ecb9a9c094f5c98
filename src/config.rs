//! Configuration file parser for ~/.config/feedpress/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which has no feeds. Unknown keys are ignored by serde, though we log a
//! warning when the file contains potential typos.
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::{FeedConfig, Frequency};

/// Maximum number of feed slots used per run.
pub const MAX_FEEDS: usize = 5;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level importer configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often the scheduled import runs.
    pub frequency: Frequency,

    /// Suffix for SEO titles (`"{title} | {brand}"`).
    pub brand: String,

    /// Author recorded on published posts.
    pub author_id: i64,

    /// SQLite file. Defaults to `feedpress.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Where sideloaded cover images go. Defaults to `media/` in the config directory.
    pub media_dir: Option<PathBuf>,

    /// Per-request timeout for feed and image downloads, in seconds.
    pub fetch_timeout_secs: u64,

    /// Feed slots, processed in order.
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency: Frequency::default(),
            brand: "Feedpress".to_string(),
            author_id: 1,
            database_path: None,
            media_dir: None,
            fetch_timeout_secs: 30,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "frequency",
        "brand",
        "author_id",
        "database_path",
        "media_dir",
        "fetch_timeout_secs",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - More than [`MAX_FEEDS`] feeds → extras dropped, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading to avoid loading a huge or corrupted file
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
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            frequency = %config.frequency,
            feeds = config.feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        if config.feeds.len() > MAX_FEEDS {
            tracing::warn!(
                configured = config.feeds.len(),
                max = MAX_FEEDS,
                "Too many feeds configured, ignoring the extras"
            );
            config.feeds.truncate(MAX_FEEDS);
        }
        Ok(config)
    }

    /// Feed slots in order, at most [`MAX_FEEDS`].
    pub fn feed_configs(&self) -> &[FeedConfig] {
        &self.feeds[..self.feeds.len().min(MAX_FEEDS)]
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("feedpress.db"))
    }

    pub fn media_dir_in(&self, config_dir: &Path) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("media"))
    }
}

// ============================================================================
// Field Deserializers
// ============================================================================

/// Feed URL, trimmed. Absent or null becomes the empty string.
pub(crate) fn trimmed_url<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).unwrap_or_default())
}

/// Category id from an integer or a numeric string; anything else is 0.
pub(crate) fn lenient_category<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCategory {
        Int(i64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match RawCategory::deserialize(deserializer)? {
        RawCategory::Int(n) => n,
        RawCategory::Text(s) => s.trim().parse().unwrap_or(0),
        RawCategory::Other(_) => 0,
    })
}

// ============================================================================
// Tests
// ============================================================================
