//! Application configuration schemas.
//!
//! All configuration structs are deserialized from the `lamess.cfg` INI
//! file via the `config` crate. Each sub-module represents a logical
//! configuration section.

pub mod device;
pub mod logging;
pub mod network;
pub mod profile;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::device::DeviceConfig;
pub use self::logging::LoggingConfig;
pub use self::network::NetworkConfig;
pub use self::profile::ProfileConfig;
pub use self::storage::StorageConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the INI
/// configuration file merged with `LAMESS_`-prefixed environment
/// variables. Every section except `[profile]` has usable defaults;
/// a missing profile fails startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listening port and interface filter.
    #[serde(default)]
    pub network: NetworkConfig,
    /// The user this node announces. Required.
    pub profile: ProfileConfig,
    /// Device preference settings.
    #[serde(default)]
    pub device: DeviceConfig,
    /// On-disk storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from an INI file path.
    ///
    /// Environment variables prefixed with `LAMESS_` (section and key
    /// separated by `__`) override file values.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Ini).required(true))
            .add_source(
                config::Environment::with_prefix("LAMESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to read {path}: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to parse {path}: {e}")))?;
        loaded.profile.validate()?;
        Ok(loaded)
    }
}
