//! Per-interface UDP listener bindings and receive loops.
//!
//! Each usable interface gets a three-port plan derived from the
//! configured base port `P`: unicast receive on `P`, multicast receive
//! on `P + 1`, and `P + 2` as the local source port for outgoing
//! datagrams.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use bytes::Bytes;
use ipnetwork::Ipv4Network;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lamess_core::error::AppError;
use lamess_core::result::AppResult;

use crate::event::MAX_DATAGRAM_SIZE;
use crate::netif::NetInterface;

/// Addressing plan for one interface.
#[derive(Debug, Clone)]
pub struct ListenerBinding {
    /// Interface name.
    pub name: String,
    /// Base port `P`.
    pub port: u16,
    /// IPv4 unicast networks of the interface.
    pub unicasts: Vec<Ipv4Network>,
    /// Multicast groups the interface listens on.
    pub multicasts: Vec<Ipv4Addr>,
}

impl ListenerBinding {
    /// Build the plan for an enumerated interface.
    pub fn new(interface: &NetInterface, port: u16) -> Self {
        Self {
            name: interface.name.clone(),
            port,
            unicasts: interface.unicasts.clone(),
            multicasts: interface.multicasts.clone(),
        }
    }

    /// The address peers should reply to: the first unicast address at
    /// the base port.
    pub fn resolved_unicast_addr(&self) -> Option<SocketAddrV4> {
        self.unicasts
            .first()
            .map(|network| SocketAddrV4::new(network.ip(), self.port))
    }

    /// Local source address for outgoing datagrams (`P + 2`).
    pub fn outbound_addr(&self) -> Option<SocketAddrV4> {
        self.unicasts
            .first()
            .map(|network| SocketAddrV4::new(network.ip(), self.port + 2))
    }

    /// Multicast destinations (`group, P + 1`) for this interface.
    pub fn multicast_targets(&self) -> Vec<SocketAddrV4> {
        self.multicasts
            .iter()
            .map(|group| SocketAddrV4::new(*group, self.port + 1))
            .collect()
    }

    /// Whether any of the interface's unicast networks contains `ip`.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.unicasts.iter().any(|network| network.contains(ip))
    }
}

/// Bind the receive sockets for one interface and spawn their loops.
///
/// Unicast payloads flow into `message_tx`, multicast payloads into
/// `broadcast_tx`. A bind failure is fatal; per-datagram errors are
/// logged and the loop keeps going.
pub(crate) async fn spawn_receivers(
    binding: &ListenerBinding,
    message_tx: mpsc::Sender<Bytes>,
    broadcast_tx: mpsc::Sender<Bytes>,
    shutdown: &broadcast::Sender<()>,
) -> AppResult<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    for network in &binding.unicasts {
        let addr = SocketAddrV4::new(network.ip(), binding.port);
        let socket = UdpSocket::bind(SocketAddr::V4(addr)).await.map_err(|e| {
            AppError::with_source(
                lamess_core::error::ErrorKind::NetworkBind,
                format!("Failed to bind unicast listener at {addr}"),
                e,
            )
        })?;
        debug!(interface = %binding.name, %addr, "Unicast listener bound");
        handles.push(tokio::spawn(receive_loop(
            Arc::new(socket),
            message_tx.clone(),
            shutdown.subscribe(),
        )));
    }

    let local_ip = binding
        .unicasts
        .first()
        .map(|network| network.ip())
        .unwrap_or(Ipv4Addr::UNSPECIFIED);
    for group in &binding.multicasts {
        let addr = SocketAddrV4::new(*group, binding.port + 1);
        let socket = UdpSocket::bind(SocketAddr::V4(addr)).await.map_err(|e| {
            AppError::with_source(
                lamess_core::error::ErrorKind::NetworkBind,
                format!("Failed to bind multicast listener at {addr}"),
                e,
            )
        })?;
        socket.join_multicast_v4(*group, local_ip).map_err(|e| {
            AppError::with_source(
                lamess_core::error::ErrorKind::NetworkBind,
                format!("Failed to join multicast group {group} on {local_ip}"),
                e,
            )
        })?;
        debug!(interface = %binding.name, %addr, "Multicast listener bound");
        handles.push(tokio::spawn(receive_loop(
            Arc::new(socket),
            broadcast_tx.clone(),
            shutdown.subscribe(),
        )));
    }

    Ok(handles)
}

/// Forward each datagram's payload onto `tx` until shutdown.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<Bytes>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    debug!(%from, len, "Datagram received");
                    if tx.send(Bytes::copy_from_slice(&buf[..len])).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Datagram receive failed");
                }
            },
            _ = shutdown.recv() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netif::ALL_HOSTS_GROUP;

    fn binding() -> ListenerBinding {
        ListenerBinding {
            name: "eth0".to_string(),
            port: 30000,
            unicasts: vec![
                Ipv4Network::new(Ipv4Addr::new(192, 168, 1, 5), 24).expect("network"),
            ],
            multicasts: vec![ALL_HOSTS_GROUP],
        }
    }

    #[test]
    fn test_port_plan() {
        let binding = binding();
        assert_eq!(
            binding.resolved_unicast_addr(),
            Some("192.168.1.5:30000".parse().expect("addr"))
        );
        assert_eq!(
            binding.outbound_addr(),
            Some("192.168.1.5:30002".parse().expect("addr"))
        );
        assert_eq!(
            binding.multicast_targets(),
            vec!["224.0.0.1:30001".parse().expect("addr")]
        );
    }

    #[test]
    fn test_contains_uses_the_interface_networks() {
        let binding = binding();
        assert!(binding.contains(Ipv4Addr::new(192, 168, 1, 77)));
        assert!(!binding.contains(Ipv4Addr::new(10, 0, 0, 1)));
    }
}
