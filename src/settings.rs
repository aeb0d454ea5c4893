//! User Settings
//!
//! Persistent defaults for ecspress, stored as JSON under the user's config
//! directory. Command line flags always win over these values.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "ecs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// AWS region used when `--region` is not given
    #[serde(default)]
    pub region: Option<String>,
    /// AWS shared-config profile used when `--profile` is not given
    #[serde(default)]
    pub profile: Option<String>,
    /// Deployment definitions directory used when `--path` is not given
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

impl Settings {
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ecspress").join("settings.json"))
    }

    /// Load from the default location; missing or unreadable files give defaults
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed settings file {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Could not read settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::settings_path() else {
            bail!("No user config directory to store settings in");
        };
        self.save_to(&path)?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Overwrite the given fields; returns whether anything changed
    pub fn update(
        &mut self,
        region: Option<String>,
        profile: Option<String>,
        config_path: Option<PathBuf>,
    ) -> bool {
        let before = self.clone();
        if region.is_some() {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        if config_path.is_some() {
            self.config_path = config_path;
        }
        *self != before
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// CLI > settings file > AWS default chain (None)
    pub fn effective_region(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.region.clone())
    }

    /// CLI > settings file > AWS default chain (None)
    pub fn effective_profile(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.profile.clone())
    }

    /// CLI > settings file > `./ecs`
    pub fn effective_config_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.config_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
