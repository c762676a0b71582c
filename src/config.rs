use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Run configuration. Every section is optional in the TOML file; CLI flags
/// override what is loaded here.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gcs: GcsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            name: default_index_name(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./index")
}
fn default_index_name() -> String {
    "corpus".to_string()
}
fn default_batch_size() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
        }
    }
}

/// Line-delimited JSON, gzip-compressed.
pub const DEFAULT_SUFFIX: &str = ".jsonl.gz";

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GcsConfig {
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub anonymous: bool,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: None,
            anonymous: false,
        }
    }
}

fn default_endpoint_url() -> String {
    "https://storage.googleapis.com".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Check value ranges. Called after loading and after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.index.batch_size == 0 {
            anyhow::bail!("index.batch_size must be > 0");
        }
        if self.input.suffix.is_empty() {
            anyhow::bail!("input.suffix must not be empty");
        }
        if self.gcs.connect_timeout_secs == 0 {
            anyhow::bail!("gcs.connect_timeout_secs must be > 0");
        }
        if self.gcs.timeout_secs == Some(0) {
            anyhow::bail!("gcs.timeout_secs must be > 0 when set");
        }
        if !(self.gcs.endpoint_url.starts_with("http://")
            || self.gcs.endpoint_url.starts_with("https://"))
        {
            anyhow::bail!(
                "gcs.endpoint_url must be an http(s) URL, got '{}'",
                self.gcs.endpoint_url
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
