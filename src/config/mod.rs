use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tracing::debug;

use crate::edit::RowCountPolicy;

const CONFIG_FILE: &str = "recordedit.json";
const MAX_CONFIRMATION_DELAY_MS: u64 = 60_000;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory holding the database
    pub data_dir: PathBuf,

    /// Database file name, relative to `data_dir` unless absolute
    pub database_file: String,

    /// How long confirmation popups stay up
    pub confirmation_delay_ms: u64,

    /// How affected-row counts of writes are checked
    pub row_count_policy: RowCountPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_file: "recordedit.db".to_string(),
            confirmation_delay_ms: 800,
            row_count_policy: RowCountPolicy::Strict,
        }
    }
}

impl Config {
    /// Initialize configuration from various sources
    pub async fn init() -> Result<Self> {
        debug!("Initializing configuration");

        let mut config = Self::default();

        // Files first, environment overrides them
        if let Some(file_config) = Self::load_from_file().await? {
            config.merge_with(file_config);
        }
        config.load_from_env()?;

        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)?;
        }

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) -> Result<()> {
        if let Ok(data_dir) = std::env::var("RECORDEDIT_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(database) = std::env::var("RECORDEDIT_DATABASE") {
            self.database_file = database;
        }

        if let Ok(delay) = std::env::var("RECORDEDIT_CONFIRMATION_DELAY_MS") {
            self.confirmation_delay_ms = delay.trim().parse().map_err(|e| {
                anyhow::anyhow!("RECORDEDIT_CONFIRMATION_DELAY_MS must be a number of milliseconds: {}", e)
            })?;
        }

        if let Ok(policy) = std::env::var("RECORDEDIT_ROW_COUNT_POLICY") {
            self.row_count_policy = policy.parse().map_err(anyhow::Error::msg)?;
        }

        Ok(())
    }

    /// Load configuration from recordedit.json files
    ///
    /// The first existing file wins:
    /// 1. ./.recordedit.json
    /// 2. ./recordedit.json
    /// 3. <config dir>/recordedit/recordedit.json
    pub async fn load_from_file() -> Result<Option<Self>> {
        let mut config_paths = vec![
            PathBuf::from(format!("./.{}", CONFIG_FILE)),
            PathBuf::from(format!("./{}", CONFIG_FILE)),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("recordedit").join(CONFIG_FILE));
        }

        for path in config_paths {
            if path.exists() {
                return Self::load_path(&path).await.map(Some);
            }
        }

        Ok(None)
    }

    /// Load configuration from a specific file
    pub async fn load_path(path: &std::path::Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration in {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Merge another configuration into this one
    ///
    /// Values left at their defaults in `other` do not override.
    pub fn merge_with(&mut self, other: Self) {
        let defaults = Self::default();
        if other.data_dir != defaults.data_dir {
            self.data_dir = other.data_dir;
        }
        if other.database_file != defaults.database_file {
            self.database_file = other.database_file;
        }
        if other.confirmation_delay_ms != defaults.confirmation_delay_ms {
            self.confirmation_delay_ms = other.confirmation_delay_ms;
        }
        if other.row_count_policy != defaults.row_count_policy {
            self.row_count_policy = other.row_count_policy;
        }
    }

    /// Full path of the database file
    pub fn database_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.database_file);
        if file.is_absolute() {
            file
        } else {
            self.data_dir.join(file)
        }
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(anyhow::anyhow!("database_file must not be empty"));
        }

        if self.confirmation_delay_ms > MAX_CONFIRMATION_DELAY_MS {
            return Err(anyhow::anyhow!(
                "confirmation_delay_ms must be at most {} (got {})",
                MAX_CONFIRMATION_DELAY_MS,
                self.confirmation_delay_ms
            ));
        }

        Ok(())
    }
}
