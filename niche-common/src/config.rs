//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "NICHE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "niche.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fragella API key (lowest priority source)
    #[serde(default)]
    pub fragella_api_key: Option<String>,

    /// FragranceFinder (RapidAPI) key (lowest priority source)
    #[serde(default)]
    pub fragrancefinder_api_key: Option<String>,

    /// Override for the Fragella base URL
    #[serde(default)]
    pub fragella_base_url: Option<String>,

    /// Override for the FragranceFinder base URL
    #[serde(default)]
    pub fragrancefinder_base_url: Option<String>,

    /// Remote sync service base URL; sync is disabled when absent
    #[serde(default)]
    pub sync_url: Option<String>,

    /// Remote change polling interval in seconds
    #[serde(default)]
    pub sync_poll_interval_secs: Option<u64>,

    /// Default per-provider result limit for searches
    #[serde(default)]
    pub default_search_limit: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load TOML config from `path`
///
/// A missing file is not an error (defaults are returned). A file that
/// exists but cannot be parsed is reported as `Error::Config`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Load TOML config, degrading to defaults with a warning on any failure
pub fn load_toml_config_or_default(path: &Path) -> TomlConfig {
    match load_toml_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default configuration: {}", e);
            TomlConfig::default()
        }
    }
}

/// Write TOML config (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Default TOML location for a module: `<config_dir>/niche/<module>.toml`
pub fn default_config_path(module_name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("niche")
        .join(format!("{}.toml", module_name))
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `NICHE_ROOT_FOLDER`
/// 3. TOML `root_folder`
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder (`~/.local/share/niche` on Linux)
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("niche"))
        .unwrap_or_else(|| PathBuf::from("./niche_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
