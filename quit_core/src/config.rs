//! Configuration file support for Quitlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/quitlog/config.toml`.
//! Every section is optional.

use crate::progress::{default_rank_tiers, default_recovery_milestones, ProgressTables};
use crate::{Error, RankTier, RecoveryMilestone, Result, Vocabulary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub vocabulary: Vocabulary,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub ranks: RankConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Recovery milestone table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_recovery_milestones")]
    pub milestones: Vec<RecoveryMilestone>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            milestones: default_recovery_milestones(),
        }
    }
}

/// Rank badge table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default = "default_rank_tiers")]
    pub tiers: Vec<RankTier>,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            tiers: default_rank_tiers(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".local/share"));
    base.join("quitlog")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        base.join("quitlog").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Directory holding the table files
    pub fn tables_dir(&self) -> PathBuf {
        self.data.data_dir.join("tables")
    }

    /// Milestone and rank tables for the progress engine
    pub fn progress_tables(&self) -> ProgressTables {
        ProgressTables {
            milestones: self.recovery.milestones.clone(),
            ranks: self.ranks.tiers.clone(),
        }
    }

    /// Validate the configuration and return any problems found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.vocabulary.validate();
        errors.extend(self.progress_tables().validate());
        errors
    }
}
