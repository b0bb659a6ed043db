//! Device section: preference index for main-session selection.

use serde::{Deserialize, Serialize};

/// `[device]` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Preference index of this device for the configured user; a lower
    /// value wins main-session selection. Defaults to 1.
    #[serde(default = "default_device_index")]
    pub deviceindex: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            deviceindex: default_device_index(),
        }
    }
}

fn default_device_index() -> u8 {
    1
}
