//! Runtime settings.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file, the
//! `GIANTBOMB_API_KEY` environment variable, command-line flags.

use crate::client::{ClientOptions, DEFAULT_TIMEOUT};
use crate::error::CatalogError;
use crate::model::Resolution;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GIANTBOMB_API_KEY";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Contents of `config.toml`. Every key is optional.
///
/// Files written by the older `gbkey` tool also load: `gbkey` is read as the
/// API key, and its run-state keys (`path`, `time`, `locked`, `write_to`) are
/// accepted and ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    #[serde(alias = "gbkey")]
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub limit: Option<u32>,
    /// Name fragments to hide from listings.
    pub exclude: Vec<String>,
    pub resolution: Option<Resolution>,
    #[serde(rename = "path")]
    _legacy_path: Option<IgnoredAny>,
    #[serde(rename = "time")]
    _legacy_time: Option<IgnoredAny>,
    #[serde(rename = "locked")]
    _legacy_locked: Option<IgnoredAny>,
    #[serde(rename = "write_to")]
    _legacy_write_to: Option<IgnoredAny>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub limit: Option<u32>,
    /// Appended to the file's list rather than replacing it.
    pub exclude: Vec<String>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub limit: Option<u32>,
    pub exclude: Vec<String>,
    pub resolution: Resolution,
    /// The config file that was read, if any.
    pub config_path: Option<PathBuf>,
}

impl Settings {
    /// Reads the config file (explicit path, else the per-user default) and
    /// the environment, then applies `overrides`.
    pub fn load(explicit_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let (file, config_path) = match explicit_path {
            Some(path) => (read_config_file(path)?, Some(path.to_path_buf())),
            None => {
                let path = default_config_path()?;
                if path.exists() {
                    (read_config_file(&path)?, Some(path))
                } else {
                    (FileConfig::default(), None)
                }
            }
        };

        let env_key = std::env::var(API_KEY_ENV).ok();
        let mut settings = Self::resolve(file, env_key, overrides)?;
        settings.config_path = config_path;
        Ok(settings)
    }

    /// Merges the layers without touching the filesystem or environment.
    pub fn resolve(file: FileConfig, env_key: Option<String>, overrides: Overrides) -> Result<Self> {
        let api_key = non_blank(overrides.api_key)
            .or(non_blank(env_key))
            .or(non_blank(file.api_key));

        let timeout = match overrides.timeout_secs.or(file.timeout_secs) {
            Some(0) => bail!("timeout must be at least one second"),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        let mut exclude = file.exclude;
        exclude.extend(overrides.exclude);
        exclude.retain(|pattern| !pattern.trim().is_empty());

        Ok(Self {
            api_key,
            timeout,
            limit: overrides.limit.or(file.limit),
            exclude,
            resolution: overrides.resolution.or(file.resolution).unwrap_or_default(),
            config_path: None,
        })
    }

    /// The API key, or `InvalidArgument` when no layer provided one.
    pub fn credential(&self) -> Result<&str, CatalogError> {
        self.api_key.as_deref().ok_or_else(|| {
            CatalogError::InvalidArgument(format!(
                "no API key: pass --api-key, set {} or add api_key to {}",
                API_KEY_ENV, CONFIG_FILE_NAME
            ))
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.timeout,
            limit: self.limit,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_config_dir() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "giantbomb", "gb-videos")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(project_dirs.config_dir().to_path_buf())
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
