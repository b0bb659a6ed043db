//! Logging section.

use serde::{Deserialize, Serialize};

/// `[logging]` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter when `RUST_LOG` is not set (e.g. `info`,
    /// `lamess_presence=debug`).
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format: `pretty` or `json`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}
