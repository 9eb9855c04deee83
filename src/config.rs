use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::btree::{DEFAULT_ORDER, MAX_ORDER};
use crate::file::BUFFER_POOL_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for opening a store, loadable from a JSON file.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Pages kept in the buffer pool
    pub page_cache_capacity: usize,
    /// B+ tree order (keys per node before a split)
    pub tree_order: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_cache_capacity: BUFFER_POOL_SIZE,
            tree_order: DEFAULT_ORDER,
        }
    }
}

impl StorageConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "page_cache_capacity must be at least 1".to_string(),
            ));
        }
        if !(3..=MAX_ORDER).contains(&self.tree_order) {
            return Err(ConfigError::Invalid(format!(
                "tree_order must be between 3 and {MAX_ORDER}, got {}",
                self.tree_order
            )));
        }
        Ok(())
    }
}
