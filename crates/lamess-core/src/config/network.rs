//! Network section: listening port and optional interface filter.

use serde::{Deserialize, Serialize};

/// `[network]` configuration.
///
/// The single configured port represents a sequential three-port plan:
/// `port` receives direct messages, `port + 1` receives multicast
/// broadcasts, and `port + 2` is the local source port for outgoing
/// datagrams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base port. Defaults to 30000.
    #[serde(default = "default_port")]
    pub port: u16,
    /// If set, only the interface with this exact name is used.
    #[serde(default)]
    pub interface: Option<String>,
}

impl NetworkConfig {
    /// Port receiving direct unicast messages.
    pub fn unicast_port(&self) -> u16 {
        self.port
    }

    /// Port receiving multicast broadcasts.
    pub fn multicast_port(&self) -> u16 {
        self.port + 1
    }

    /// Local source port for outgoing datagrams.
    pub fn outbound_port(&self) -> u16 {
        self.port + 2
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            interface: None,
        }
    }
}

fn default_port() -> u16 {
    30000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_roles() {
        let network = NetworkConfig::default();
        assert_eq!(network.unicast_port(), 30000);
        assert_eq!(network.multicast_port(), 30001);
        assert_eq!(network.outbound_port(), 30002);
    }
}
