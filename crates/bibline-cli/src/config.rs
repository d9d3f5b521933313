//! Configuration loading from TOML files

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use bibline_core::{DEFAULT_MAX_ROWS_PER_FILE, OutputFormat};
use bibline_normalize::SourceKind;
use serde::Deserialize;

/// Global configuration for bibline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub normalize: NormalizeConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(deserialize_with = "deserialize_parsed")]
    pub format: OutputFormat,
    pub max_rows_per_file: usize,
    pub compression_level: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./tables"),
            format: OutputFormat::Parquet,
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    #[serde(deserialize_with = "deserialize_parsed")]
    pub source: SourceKind,
    pub workers: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            workers: bibline_normalize::config::default_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoadConfig {
    /// DuckDB file; `${VAR}` reads it from the environment
    #[serde(deserialize_with = "deserialize_env_var")]
    pub database: Option<String>,
    pub memory_limit: Option<String>,
}

impl LoadConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_deref()
            .map_or_else(|| PathBuf::from("bibline.duckdb"), PathBuf::from)
    }
}

/// Deserialize a string through the type's `FromStr`
fn deserialize_parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./bibline.toml (current directory)
    /// 2. ~/.config/bibline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("bibline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "bibline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
