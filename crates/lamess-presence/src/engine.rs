//! The presence engine: listener sets, broadcast fan-out, the ping
//! ticker, and shutdown coordination.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{Duration, Utc};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lamess_core::config::NetworkConfig;
use lamess_core::error::AppError;
use lamess_core::result::AppResult;
use lamess_core::validate;
use lamess_entity::profile::UserProfile;

use crate::dedup::DedupRegistry;
use crate::dispatcher::{
    run_broadcast_loop, run_message_loop, BroadcastListener, MessageListener, SubscriberSet,
};
use crate::event;
use crate::listener::{self, ListenerBinding};
use crate::netif::{self, InterfaceSource};
use crate::packet::{self, Packet};
use crate::reply::RegisterReplier;

/// How long an announced session stays live without a renewal.
pub const SESSION_LIFETIME_SECS: i64 = 5 * 60;
/// Interval between presence pings.
pub const PING_INTERVAL_SECS: u64 = 2 * 60;

const CHANNEL_CAPACITY: usize = 1024;
const JOIN_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

fn session_age() -> Duration {
    Duration::seconds(SESSION_LIFETIME_SECS)
}

/// Outgoing datagram paths over the bound listener set.
///
/// Every send opens a short-lived socket bound to the owning listener's
/// `P + 2` source port, writes one datagram, and closes.
pub(crate) struct Outbound {
    bindings: Vec<ListenerBinding>,
}

impl Outbound {
    /// The bound listeners.
    pub(crate) fn bindings(&self) -> &[ListenerBinding] {
        &self.bindings
    }

    /// The listener whose unicast network contains `ip`.
    pub(crate) fn route(&self, ip: Ipv4Addr) -> Option<&ListenerBinding> {
        self.bindings.iter().find(|binding| binding.contains(ip))
    }

    /// Send one datagram to a peer through the listener facing it.
    pub(crate) async fn send_unicast(&self, to: SocketAddrV4, frame: &[u8]) -> AppResult<()> {
        let binding = self
            .route(*to.ip())
            .ok_or_else(|| AppError::transport(format!("no listener covers {to}")))?;
        let local = binding
            .outbound_addr()
            .ok_or_else(|| AppError::transport("listener has no unicast address"))?;
        let socket = UdpSocket::bind(SocketAddr::V4(local)).await.map_err(|e| {
            AppError::with_source(
                lamess_core::error::ErrorKind::Transport,
                format!("Failed to bind outbound socket at {local}"),
                e,
            )
        })?;
        socket.send_to(frame, SocketAddr::V4(to)).await.map_err(|e| {
            AppError::with_source(
                lamess_core::error::ErrorKind::Transport,
                format!("Failed to send to {to}"),
                e,
            )
        })?;
        Ok(())
    }

    /// Send one datagram to every multicast target of a listener.
    /// Returns true iff at least one datagram left.
    pub(crate) async fn multicast(&self, binding: &ListenerBinding, frame: &[u8]) -> bool {
        let Some(local) = binding.outbound_addr() else {
            return false;
        };
        let mut any_sent = false;
        for target in binding.multicast_targets() {
            let socket = match UdpSocket::bind(SocketAddr::V4(local)).await {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(%local, error = %e, "Failed to bind outbound socket");
                    continue;
                }
            };
            match socket.send_to(frame, SocketAddr::V4(target)).await {
                Ok(_) => any_sent = true,
                Err(e) => warn!(%target, error = %e, "Multicast send failed"),
            }
        }
        any_sent
    }
}

/// UDP presence and messaging engine.
///
/// Lifecycle: create with [`PresenceEngine::new`], register listeners,
/// [`setup`](Self::setup) the sockets and dispatchers,
/// [`announce`](Self::announce) to join the network, and finally
/// [`close_communication`](Self::close_communication).
pub struct PresenceEngine {
    port: u16,
    interface_filter: Option<String>,
    profile: UserProfile,
    device_index: u8,
    message_listeners: Arc<SubscriberSet<dyn MessageListener>>,
    broadcast_listeners: Arc<SubscriberSet<dyn BroadcastListener>>,
    dedup: Arc<DedupRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    outbound: OnceLock<Arc<Outbound>>,
    ping_quit: Mutex<Option<mpsc::Sender<oneshot::Sender<()>>>>,
    dispatch_handles: Mutex<Vec<JoinHandle<()>>>,
    receiver_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PresenceEngine {
    /// Create an engine announcing the given profile and device index.
    pub fn new(network: &NetworkConfig, profile: UserProfile, device_index: u8) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            port: network.unicast_port(),
            interface_filter: network.interface.clone(),
            profile,
            device_index,
            message_listeners: Arc::new(SubscriberSet::new()),
            broadcast_listeners: Arc::new(SubscriberSet::new()),
            dedup: Arc::new(DedupRegistry::new()),
            shutdown_tx,
            outbound: OnceLock::new(),
            ping_quit: Mutex::new(None),
            dispatch_handles: Mutex::new(Vec::new()),
            receiver_handles: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to direct messages. Returns true iff the subscriber set
    /// grew. Listeners must be registered before [`setup`](Self::setup).
    pub fn add_message_listener(&self, listener: Arc<dyn MessageListener>) -> bool {
        self.message_listeners.add(listener)
    }

    /// Unsubscribe a message listener by identity. Returns true iff the
    /// subscriber set shrank.
    pub fn remove_message_listener(&self, listener: &Arc<dyn MessageListener>) -> bool {
        self.message_listeners.remove(listener)
    }

    /// Subscribe to broadcast events. Returns true iff the subscriber
    /// set grew.
    pub fn add_broadcast_listener(&self, listener: Arc<dyn BroadcastListener>) -> bool {
        self.broadcast_listeners.add(listener)
    }

    /// Unsubscribe a broadcast listener by identity. Returns true iff
    /// the subscriber set shrank.
    pub fn remove_broadcast_listener(&self, listener: &Arc<dyn BroadcastListener>) -> bool {
        self.broadcast_listeners.remove(listener)
    }

    /// Bind the listener sockets on every usable interface and start the
    /// receive and dispatch loops.
    pub async fn setup(&self, source: &dyn InterfaceSource) -> AppResult<()> {
        if self.outbound.get().is_some() {
            return Err(AppError::invalid_state("communication is already set up"));
        }
        let interfaces =
            netif::select_interfaces(source.interfaces()?, self.interface_filter.as_deref());
        if interfaces.is_empty() {
            return Err(AppError::network_bind(
                "no usable network interfaces to listen on",
            ));
        }

        let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut bindings = Vec::with_capacity(interfaces.len());
        let mut receivers = Vec::new();
        for interface in &interfaces {
            let binding = ListenerBinding::new(interface, self.port);
            receivers.extend(
                listener::spawn_receivers(
                    &binding,
                    message_tx.clone(),
                    broadcast_tx.clone(),
                    &self.shutdown_tx,
                )
                .await?,
            );
            info!(
                interface = %binding.name,
                port = self.port,
                addresses = binding.unicasts.len(),
                groups = binding.multicasts.len(),
                "Listening"
            );
            bindings.push(binding);
        }

        let outbound = Arc::new(Outbound { bindings });
        let _ = self.outbound.set(outbound.clone());
        // The receive loops hold the only channel senders; the dispatch
        // loops therefore see their channels close once the receivers
        // exit on shutdown.
        drop(message_tx);
        drop(broadcast_tx);

        // The register replier always dispatches ahead of application
        // listeners.
        self.broadcast_listeners.add_first(Arc::new(RegisterReplier::new(
            outbound,
            self.profile.clone(),
            self.device_index,
            session_age(),
            self.shutdown_tx.clone(),
        )));

        let mut handles = self
            .dispatch_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        handles.push(tokio::spawn(run_message_loop(
            message_rx,
            self.message_listeners.clone(),
            self.shutdown_tx.subscribe(),
        )));
        handles.push(tokio::spawn(run_broadcast_loop(
            broadcast_rx,
            self.broadcast_listeners.clone(),
            self.dedup.clone(),
            self.shutdown_tx.subscribe(),
        )));
        self.receiver_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(receivers);
        Ok(())
    }

    /// Join the network: multicast a Register on every listener (retried
    /// until at least one datagram leaves) and start the ping ticker.
    pub async fn announce(&self) -> AppResult<()> {
        let outbound = self.outbound()?;
        info!("Sending initial presence broadcasts");
        for binding in outbound.bindings() {
            let Some(reply_to) = binding.resolved_unicast_addr() else {
                continue;
            };
            if binding.multicast_targets().is_empty() {
                debug!(interface = %binding.name, "No multicast groups; skipping join broadcast");
                continue;
            }
            let register = packet::factory()
                .new_session(session_age())
                .with_profile(
                    self.profile.username(),
                    self.profile.display_name(),
                    self.profile.email(),
                )?
                .for_device(&reply_to.to_string(), self.device_index)?;
            let frame = event::encode(&Packet::Register(register))?;

            let mut attempt = 0u32;
            while !outbound.multicast(binding, &frame).await {
                attempt += 1;
                warn!(interface = %binding.name, attempt, "Join broadcast failed, retrying");
                tokio::time::sleep(JOIN_RETRY_DELAY).await;
            }
        }
        self.start_ping(outbound);
        Ok(())
    }

    fn start_ping(&self, outbound: Arc<Outbound>) {
        let (quit_tx, mut quit_rx) = mpsc::channel::<oneshot::Sender<()>>(1);
        *self.ping_quit.lock().unwrap_or_else(|e| e.into_inner()) = Some(quit_tx);

        let dedup = self.dedup.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(PING_INTERVAL_SECS));
            // The first tick of a tokio interval is immediate; the join
            // broadcast already announced us.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let ping = packet::factory().ping(session_age());
                        match event::encode(&Packet::Ping(ping)) {
                            Ok(frame) => {
                                for binding in outbound.bindings() {
                                    if !outbound.multicast(binding, &frame).await {
                                        warn!(interface = %binding.name, "Presence ping was not sent");
                                    }
                                }
                            }
                            Err(e) => warn!(error = %e, "Failed to encode ping"),
                        }
                        dedup.sweep(Utc::now());
                    }
                    ack = quit_rx.recv() => {
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        return;
                    }
                }
            }
        });
    }

    /// Send a direct message to a peer's reply-to address.
    ///
    /// The destination must fall inside some listener's unicast network;
    /// otherwise the call logs and returns without sending.
    pub async fn send_message(&self, to: &str, payload: &[u8]) {
        if !validate::is_valid_connection_string(to) {
            warn!(%to, "Refusing to send to a malformed connection string");
            return;
        }
        let Ok(addr) = to.parse::<SocketAddrV4>() else {
            warn!(%to, "Unparseable connection string");
            return;
        };
        let outbound = match self.outbound() {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(error = %e, "Cannot send before setup");
                return;
            }
        };
        if let Err(e) = outbound.send_unicast(addr, payload).await {
            warn!(%to, error = %e, "Direct message send failed");
        }
    }

    /// Shut the engine down: multicast a best-effort SignOff, stop the
    /// ping ticker (waiting for its acknowledgement), and stop the
    /// receive and dispatch loops. Every subscribed listener observes
    /// its end-of-stream callback exactly once before this returns.
    pub async fn close_communication(&self) {
        info!("Closing communication");
        if let Some(outbound) = self.outbound.get() {
            match event::encode(&Packet::SignOff(packet::factory().sign_off())) {
                Ok(frame) => {
                    for binding in outbound.bindings() {
                        if !outbound.multicast(binding, &frame).await {
                            debug!(interface = %binding.name, "Sign-off broadcast not sent");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode sign-off"),
            }
        }

        let quit = self
            .ping_quit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(quit) = quit {
            let (ack_tx, ack_rx) = oneshot::channel();
            if quit.send(ack_tx).await.is_ok() {
                let _ = ack_rx.await;
            }
        }

        let _ = self.shutdown_tx.send(());

        let dispatchers: Vec<_> = self
            .dispatch_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in dispatchers {
            let _ = handle.await;
        }
        let receivers: Vec<_> = self
            .receiver_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in receivers {
            let _ = handle.await;
        }
        info!("Communication closed");
    }

    fn outbound(&self) -> AppResult<Arc<Outbound>> {
        self.outbound
            .get()
            .cloned()
            .ok_or_else(|| AppError::invalid_state("communication has not been set up"))
    }
}
