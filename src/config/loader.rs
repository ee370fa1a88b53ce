//! Configuration loading from file system
//!
//! Reads the JSON config file next to the project's stories.

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::defaults::DEFAULT_CONFIG_PATH;
use super::types::StorybookConfig;
use crate::error::{Result, StoryError};

/// Expand `~` and resolve the config path, falling back to DEFAULT_CONFIG_PATH
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    let raw = explicit.unwrap_or(DEFAULT_CONFIG_PATH);
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Load configuration from `path`.
///
/// Returns StorybookConfig::default() if the file is missing or cannot be
/// parsed; the reason is logged.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> StorybookConfig {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return StorybookConfig::default();
    }

    match try_load_config(path) {
        Ok(config) => {
            info!(
                path = %path.display(),
                sources = config.stories.len(),
                "Successfully loaded config"
            );
            config
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            StorybookConfig::default()
        }
    }
}

/// Strict variant of [`load_config`]: any read or parse failure is returned
pub fn try_load_config(path: &Path) -> Result<StorybookConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| StoryError::Config(format!("{}: {}", path.display(), e)))?;

    let config: StorybookConfig = serde_json::from_str(&contents).map_err(|e| {
        let hint = if e.to_string().contains("missing field `directory`") {
            " (every entry in \"stories\" needs a \"directory\")"
        } else {
            ""
        };
        StoryError::Config(format!("{}: {}{}", path.display(), e, hint))
    })?;

    if config.stories.is_empty() {
        warn!(path = %path.display(), "Config declares no story sources");
    }

    Ok(config)
}
