use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted user configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default output root for mirrored folders
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub settings: CrawlSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        // A config written by an older version falls back to defaults
        Ok(serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable config {:?}: {}", config_path, e);
            Config::default()
        }))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("drivecrawl").join("config.json"))
    }

    /// Log file used by `watch`, next to the config file
    pub fn get_log_path() -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        let dir = config_path
            .parent()
            .with_context(|| format!("Config path {:?} has no parent", config_path))?;
        Ok(dir.join("drivecrawl.log"))
    }

    pub fn set_output_path(&mut self, path: String) {
        self.output_path = Some(path);
    }

    pub fn get_output_path(&self) -> Option<&String> {
        self.output_path.as_ref()
    }

    /// Resolve the output root: explicit flag, then config, then `./downloads`
    pub fn resolve_output_root(&self, flag: Option<&str>) -> PathBuf {
        flag.map(PathBuf::from)
            .or_else(|| self.output_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }
}

/// A randomized delay window, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterRange {
    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    pub const fn zero() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Pick a delay uniformly inside the window (inverted bounds are swapped)
    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// Every tunable of a crawl run
///
/// Passed by reference from the command down to the crawler, the folder
/// scanner and the file fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub max_attempts: u32,
    pub pre_download_wait: JitterRange,
    pub retry_backoff: JitterRange,
    pub download_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub control_poll_attempts: u32,
    pub control_poll_interval_ms: u64,
    pub post_click_wait_ms: u64,
    pub settle_stable_ms: u64,
    pub settle_interval_ms: u64,
    pub settle_max_rounds: u32,
    /// Path prefixes that mark folder links
    pub folder_prefixes: Vec<String>,
    /// Path prefixes that mark file links
    pub file_prefixes: Vec<String>,
    /// Texts that identify the download control on a file page
    pub download_labels: Vec<String>,
    /// Selector of the site's error banner shown after a failed click
    pub error_selector: String,
    pub skip_existing: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            pre_download_wait: JitterRange::from_secs(5, 10),
            retry_backoff: JitterRange::from_secs(5, 15),
            download_timeout_secs: 120,
            navigation_timeout_secs: 60,
            control_poll_attempts: 10,
            control_poll_interval_ms: 1000,
            post_click_wait_ms: 2000,
            settle_stable_ms: 1500,
            settle_interval_ms: 500,
            settle_max_rounds: 20,
            folder_prefixes: vec!["/pasta/".to_string()],
            file_prefixes: vec!["/arquivo/".to_string(), "/pdf/".to_string()],
            download_labels: vec!["Download".to_string(), "Baixar".to_string()],
            error_selector: ".alert-danger, .error-message, [role='alert']".to_string(),
            skip_existing: true,
        }
    }
}

impl CrawlSettings {
    /// Settings with every wait set to zero, for fast runs against local fakes
    pub fn immediate() -> Self {
        Self {
            pre_download_wait: JitterRange::zero(),
            retry_backoff: JitterRange::zero(),
            control_poll_interval_ms: 0,
            post_click_wait_ms: 0,
            settle_stable_ms: 0,
            settle_interval_ms: 0,
            ..Self::default()
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn control_poll_interval(&self) -> Duration {
        Duration::from_millis(self.control_poll_interval_ms)
    }

    pub fn post_click_wait(&self) -> Duration {
        Duration::from_millis(self.post_click_wait_ms)
    }

    pub fn settle_stable(&self) -> Duration {
        Duration::from_millis(self.settle_stable_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Apply one `key = value` pair, as given to `drivecrawl config set`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse_u64(key: &str, value: &str) -> Result<u64> {
            value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("'{}' expects a non-negative integer, got '{}'", key, value))
        }

        fn parse_u32(key: &str, value: &str) -> Result<u32> {
            value.trim().parse::<u32>().with_context(|| {
                format!(
                    "'{}' expects an integer between 0 and {}, got '{}'",
                    key,
                    u32::MAX,
                    value
                )
            })
        }

        fn parse_range(key: &str, value: &str) -> Result<JitterRange> {
            let (lo, hi) = value
                .split_once('-')
                .with_context(|| format!("'{}' expects a range like 5-10 (seconds)", key))?;
            Ok(JitterRange::from_secs(parse_u64(key, lo)?, parse_u64(key, hi)?))
        }

        fn parse_list(value: &str) -> Vec<String> {
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }

        match key {
            "max-attempts" => {
                let n = parse_u32(key, value)?;
                anyhow::ensure!(n >= 1, "max-attempts must be at least 1");
                self.max_attempts = n;
            }
            "pre-download-wait" => self.pre_download_wait = parse_range(key, value)?,
            "retry-backoff" => self.retry_backoff = parse_range(key, value)?,
            "download-timeout" => self.download_timeout_secs = parse_u64(key, value)?,
            "navigation-timeout" => self.navigation_timeout_secs = parse_u64(key, value)?,
            "control-poll-attempts" => self.control_poll_attempts = parse_u32(key, value)?,
            "control-poll-interval" => self.control_poll_interval_ms = parse_u64(key, value)?,
            "post-click-wait" => self.post_click_wait_ms = parse_u64(key, value)?,
            "settle-stable" => self.settle_stable_ms = parse_u64(key, value)?,
            "settle-interval" => self.settle_interval_ms = parse_u64(key, value)?,
            "settle-max-rounds" => self.settle_max_rounds = parse_u32(key, value)?,
            "folder-prefixes" => self.folder_prefixes = parse_list(value),
            "file-prefixes" => self.file_prefixes = parse_list(value),
            "download-labels" => self.download_labels = parse_list(value),
            "error-selector" => self.error_selector = value.trim().to_string(),
            "skip-existing" => {
                self.skip_existing = match value.trim().to_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    other => anyhow::bail!("'skip-existing' expects true/false, got '{}'", other),
                }
            }
            _ => anyhow::bail!(
                "Unknown setting '{}'. Known settings: {}",
                key,
                Self::KEYS.join(", ")
            ),
        }

        Ok(())
    }

    pub const KEYS: &'static [&'static str] = &[
        "max-attempts",
        "pre-download-wait",
        "retry-backoff",
        "download-timeout",
        "navigation-timeout",
        "control-poll-attempts",
        "control-poll-interval",
        "post-click-wait",
        "settle-stable",
        "settle-interval",
        "settle-max-rounds",
        "folder-prefixes",
        "file-prefixes",
        "download-labels",
        "error-selector",
        "skip-existing",
    ];
}
