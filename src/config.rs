//! Configuration parsing and validation.
//!
//! Settings are read from an optional TOML file. Every section has defaults,
//! so an empty file is a valid configuration; command-line flags override
//! whatever the file says.
//!
//! # Example
//!
//! ```toml
//! [source]
//! dir = "./reports"
//! include_globs = ["*.csv"]
//! exclude_globs = ["result-*"]
//! snapshot_glob = "*.index.json"
//!
//! [engine]
//! backend = "columnar"
//!
//! [output]
//! dir = "./results"
//! format = "json"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use termrank_core::store::Backend;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where report files and snapshots are found.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_snapshot_glob")]
    pub snapshot_glob: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: None,
            include_globs: default_include_globs(),
            exclude_globs: default_exclude_globs(),
            snapshot_glob: default_snapshot_glob(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["*.csv".to_string()]
}

// Exported results land in the source directory by default.
fn default_exclude_globs() -> Vec<String> {
    vec!["result-*".to_string()]
}

fn default_snapshot_glob() -> String {
    "*.index.json".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: Option<String>,
}

impl EngineConfig {
    pub fn backend(&self) -> Result<Backend> {
        match &self.backend {
            Some(name) => name.parse(),
            None => Ok(Backend::Associative),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "csv".to_string()
}

impl Config {
    /// Configuration used when no file is given.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.source.include_globs.is_empty() {
        bail!("source.include_globs must list at least one pattern");
    }

    config
        .engine
        .backend()
        .with_context(|| "Invalid engine.backend")?;

    match config.output.format.as_str() {
        "csv" | "json" => {}
        other => bail!("Unknown output.format: '{}'. Must be csv or json.", other),
    }

    Ok(config)
}
