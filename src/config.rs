//! Configuration for podflow paths, feeds, and pipeline settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PODFLOW_HOME)
//! 2. Config file (.podflow/config.yaml)
//! 3. Defaults (~/.podflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .podflow/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::ledger::{Price, PriceTable};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    #[serde(default)]
    pub pricing: HashMap<String, Price>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
    /// Video watch list file (relative to config file)
    pub watchlist: Option<String>,
}

/// One subscribed RSS feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub rss: String,
    /// Tags applied to every episode of this feed
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub min_chapter_minutes: Option<f64>,
    pub max_tags: Option<usize>,
    pub tag_input_max_chars: Option<usize>,
    pub throttle_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub whisper_model: Option<String>,
    pub fast_model: Option<String>,
    pub summary_model: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to podflow home (state, artifacts, audio)
    pub home: PathBuf,
    /// Path to the video watch list file
    pub watchlist: PathBuf,
    /// Subscribed feeds
    pub feeds: Vec<FeedConfig>,
    /// Pipeline settings
    pub pipeline: PipelineSettings,
    /// Per-service prices (defaults plus config overrides)
    pub prices: PriceTable,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Episodes shorter than this skip chapter extraction
    pub min_chapter_minutes: f64,
    /// Upper bound on tags per item
    pub max_tags: usize,
    /// Summary text fed to the tag prompt is truncated to this length
    pub tag_input_max_chars: usize,
    /// Pause between items in a batch
    pub throttle_seconds: u64,
    /// Timeout applied to every external call
    pub timeout_seconds: u64,
    pub whisper_model: String,
    pub fast_model: String,
    pub summary_model: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_chapter_minutes: 45.0,
            max_tags: 6,
            tag_input_max_chars: 6000,
            throttle_seconds: 6,
            timeout_seconds: 600,
            whisper_model: "base".to_string(),
            fast_model: "claude-3-5-haiku-20241022".to_string(),
            summary_model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

impl PipelineSettings {
    fn from_config(config: Option<&PipelineConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            min_chapter_minutes: config.min_chapter_minutes.unwrap_or(defaults.min_chapter_minutes),
            max_tags: config.max_tags.unwrap_or(defaults.max_tags),
            tag_input_max_chars: config
                .tag_input_max_chars
                .unwrap_or(defaults.tag_input_max_chars),
            throttle_seconds: config.throttle_seconds.unwrap_or(defaults.throttle_seconds),
            timeout_seconds: config.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            whisper_model: config
                .whisper_model
                .clone()
                .unwrap_or(defaults.whisper_model),
            fast_model: config.fast_model.clone().unwrap_or(defaults.fast_model),
            summary_model: config
                .summary_model
                .clone()
                .unwrap_or(defaults.summary_model),
        }
    }

    /// Timeout for external calls as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ResolvedConfig {
    /// Directory for downloaded audio ($PODFLOW_HOME/audio)
    pub fn audio_dir(&self) -> PathBuf {
        self.home.join("audio")
    }

    /// Directory for per-item stage artifacts ($PODFLOW_HOME/artifacts)
    pub fn artifacts_dir(&self) -> PathBuf {
        self.home.join("artifacts")
    }

    /// Seen-set path ($PODFLOW_HOME/seen.json)
    pub fn seen_path(&self) -> PathBuf {
        self.home.join("seen.json")
    }

    /// Cost ledger path ($PODFLOW_HOME/costs.jsonl)
    pub fn costs_path(&self) -> PathBuf {
        self.home.join("costs.jsonl")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".podflow").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".podflow");

    // Check for config file
    let config_file = find_config_file();

    let (home, watchlist, feeds, pipeline, prices) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .podflow/ (i.e., grandparent of config.yaml)
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        let home = if let Ok(env_home) = std::env::var("PODFLOW_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to .podflow/ directory
            let podflow_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(podflow_dir, home_path)
        } else {
            default_home.clone()
        };

        let watchlist = if let Some(ref watchlist_path) = config.paths.watchlist {
            resolve_path(base_dir, watchlist_path)
        } else {
            home.join("watchlist.txt")
        };

        let pipeline = PipelineSettings::from_config(config.pipeline.as_ref());

        // Config pricing overrides layer over the built-in table
        let mut prices = PriceTable::default();
        for (service, price) in config.pricing {
            prices.0.insert(service, price);
        }

        (home, watchlist, config.feeds, pipeline, prices)
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("PODFLOW_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let watchlist = home.join("watchlist.txt");

        (
            home,
            watchlist,
            Vec::new(),
            PipelineSettings::default(),
            PriceTable::default(),
        )
    };

    Ok(ResolvedConfig {
        home,
        watchlist,
        feeds,
        pipeline,
        prices,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
