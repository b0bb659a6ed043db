//! Network interface enumeration.
//!
//! The engine only needs a list of usable interfaces with their IPv4
//! unicast networks and multicast groups; where that list comes from is
//! abstracted behind [`InterfaceSource`] so tests can inject fixtures.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use lamess_core::result::AppResult;

/// The IPv4 all-hosts group every multicast-capable interface belongs
/// to. This is the group presence broadcasts are addressed to.
pub const ALL_HOSTS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// A usable network interface: up, not loopback, with its IPv4
/// addressing.
#[derive(Debug, Clone)]
pub struct NetInterface {
    /// OS interface name (e.g. `wlan0`).
    pub name: String,
    /// IPv4 unicast networks assigned to the interface.
    pub unicasts: Vec<Ipv4Network>,
    /// IPv4 multicast groups reachable through the interface.
    pub multicasts: Vec<Ipv4Addr>,
}

/// Source of usable network interfaces.
pub trait InterfaceSource: Send + Sync {
    /// Enumerate interfaces that are up and not loopback.
    fn interfaces(&self) -> AppResult<Vec<NetInterface>>;
}

/// Enumerates the operating system's interfaces.
#[derive(Debug, Default)]
pub struct SystemInterfaceSource;

impl InterfaceSource for SystemInterfaceSource {
    fn interfaces(&self) -> AppResult<Vec<NetInterface>> {
        let interfaces = pnet_datalink::interfaces()
            .into_iter()
            .filter(|iface| iface.is_up() && !iface.is_loopback())
            .map(|iface| {
                let unicasts: Vec<Ipv4Network> = iface
                    .ips
                    .iter()
                    .filter_map(|network| match network {
                        ipnetwork::IpNetwork::V4(v4) => Some(*v4),
                        ipnetwork::IpNetwork::V6(_) => None,
                    })
                    .collect();
                let multicasts = if iface.is_multicast() {
                    vec![ALL_HOSTS_GROUP]
                } else {
                    Vec::new()
                };
                NetInterface {
                    name: iface.name,
                    unicasts,
                    multicasts,
                }
            })
            .collect();
        Ok(interfaces)
    }
}

/// Keep only interfaces matching the configured name filter, or all of
/// them when no filter is set. Interfaces without any IPv4 unicast
/// address are dropped either way.
pub fn select_interfaces(
    interfaces: Vec<NetInterface>,
    filter: Option<&str>,
) -> Vec<NetInterface> {
    interfaces
        .into_iter()
        .filter(|iface| filter.map_or(true, |name| iface.name == name))
        .filter(|iface| !iface.unicasts.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, unicasts: Vec<Ipv4Network>) -> NetInterface {
        NetInterface {
            name: name.to_string(),
            unicasts,
            multicasts: vec![ALL_HOSTS_GROUP],
        }
    }

    fn network(addr: [u8; 4], prefix: u8) -> Ipv4Network {
        Ipv4Network::new(Ipv4Addr::from(addr), prefix).expect("valid network")
    }

    #[test]
    fn test_filter_keeps_matching_interface_only() {
        let all = vec![
            iface("eth0", vec![network([192, 168, 1, 5], 24)]),
            iface("wlan0", vec![network([10, 0, 0, 7], 8)]),
        ];
        let selected = select_interfaces(all, Some("wlan0"));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "wlan0");
    }

    #[test]
    fn test_no_filter_keeps_everything_with_addresses() {
        let all = vec![
            iface("eth0", vec![network([192, 168, 1, 5], 24)]),
            iface("tun0", vec![]),
        ];
        let selected = select_interfaces(all, None);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "eth0");
    }
}
