//! Loading and saving [`SplitrunConfig`] from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use splitrun_types::SplitrunConfig;

use crate::error::ConfigError;

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<SplitrunConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(SplitrunConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save a config to a TOML file, creating parent directories.
pub fn save_config(path: &Path, config: &SplitrunConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Get the default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("splitrun").join("config.toml"))
}

/// Where `runs.json` lives: the configured path, else the platform data
/// directory, else `./splits/runs.json`.
pub fn resolve_ledger_path(config: &SplitrunConfig) -> PathBuf {
    if let Some(path) = &config.ledger_path {
        return path.clone();
    }
    dirs::data_dir()
        .map(|p| p.join("splitrun").join("runs.json"))
        .unwrap_or_else(|| PathBuf::from("splits").join("runs.json"))
}
