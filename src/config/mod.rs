use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extractors::IndexPolicy;

/// Longest accepted courtesy delay, one day
pub const MAX_DELAY_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Download behaviour
    pub download: DownloadConfig,

    /// HTTP client settings
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Seconds to wait before every transcript request
    pub delay_secs: f64,

    /// Directory transcripts are written to
    pub output_dir: PathBuf,

    /// How playlist entries are numbered after unresolvable ones are dropped
    pub index_policy: IndexPolicy,

    /// Preferred transcript languages, most preferred first
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent sent with every request
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Base URL of the YouTube site
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5.0,
            output_dir: PathBuf::from("transcripts"),
            index_policy: IndexPolicy::Renumber,
            languages: vec!["en".to_string()],
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_secs: 30,
            base_url: "https://www.youtube.com".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, the default locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::default_paths().into_iter().find(|path| path.exists()) {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Location `config --init` writes to
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("yt-transcripts").join("config.yaml"))
    }

    fn default_paths() -> Vec<PathBuf> {
        // Current directory first for easy testing
        let mut paths = vec![PathBuf::from("config.yaml")];
        if let Ok(path) = Self::user_config_path() {
            paths.push(path);
        }
        paths
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // NaN fails the range check too
        if !(0.0..=MAX_DELAY_SECS).contains(&self.download.delay_secs) {
            anyhow::bail!(
                "download.delay_secs must be between 0 and {} seconds, got {}",
                MAX_DELAY_SECS,
                self.download.delay_secs
            );
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than zero");
        }

        url::Url::parse(&self.http.base_url)
            .with_context(|| format!("http.base_url is not a valid URL: {}", self.http.base_url))?;

        Ok(())
    }

    /// Courtesy delay before each transcript request
    pub fn delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.download.delay_secs)
            .with_context(|| format!("Invalid delay: {}s", self.download.delay_secs))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Delay: {}s", self.download.delay_secs);
        println!("  Output Directory: {}", self.download.output_dir.display());
        println!("  Index Policy: {}", self.download.index_policy);
        println!("  Languages: {}", self.download.languages.join(", "));
        println!("  User Agent: {}", self.http.user_agent);
        println!("  Timeout: {}s", self.http.timeout_secs);
        println!("  Base URL: {}", self.http.base_url);
    }
}
