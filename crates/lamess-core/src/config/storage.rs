//! Storage section: where the peer database lives.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;

/// `[storage]` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for application data. Defaults to `lamess` under the
    /// system temporary directory.
    #[serde(default = "default_location")]
    pub location: String,
}

impl StorageConfig {
    /// Return the storage directory, creating it if needed.
    pub fn ensure_location(&self) -> Result<PathBuf, AppError> {
        let path = PathBuf::from(&self.location);
        if !path.exists() {
            info!(location = %self.location, "Creating storage directory");
            std::fs::create_dir_all(&path).map_err(|e| {
                AppError::with_source(
                    crate::error::ErrorKind::Configuration,
                    format!("Failed to create storage directory {}: {e}", self.location),
                    e,
                )
            })?;
        }
        Ok(path)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
        }
    }
}

fn default_location() -> String {
    std::env::temp_dir()
        .join("lamess")
        .to_string_lossy()
        .into_owned()
}
