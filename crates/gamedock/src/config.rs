//! JSON configuration for the companion server.

use std::path::Path;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use extension_system::ExtensionConfigs;

/// Application configuration loaded from the JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing the game's exported HTML shell and assets.
    pub game_path: PathBuf,
    /// Extension id → opaque extension config. Ids without an entry are not
    /// instantiated.
    #[serde(default)]
    pub extensions: ExtensionConfigs,
}

impl Config {
    /// Loads and validates the configuration file.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.game_path.as_os_str().is_empty() {
            bail!("game_path cannot be empty");
        }
        Ok(())
    }
}
