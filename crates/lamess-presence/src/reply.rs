//! Internal broadcast listener that answers newly discovered peers.
//!
//! A peer that just joined only knows about us if it hears a Register
//! carrying our reply-to address. Multicast join announcements cover
//! the steady state; this listener covers the asymmetric case by
//! unicasting a Register straight back to every newly accepted peer.

use std::net::SocketAddrV4;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use lamess_entity::profile::UserProfile;

use crate::dispatcher::BroadcastListener;
use crate::engine::Outbound;
use crate::event;
use crate::packet::{self, Packet, PingPacket, RegisterPacket, SignOffPacket};

const REPLY_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

/// Replies to a newly accepted peer Register with a unicast Register of
/// our own, pinned to the listener facing that peer.
pub(crate) struct RegisterReplier {
    outbound: Arc<Outbound>,
    profile: UserProfile,
    device_index: u8,
    session_age: Duration,
    shutdown: broadcast::Sender<()>,
}

impl RegisterReplier {
    pub(crate) fn new(
        outbound: Arc<Outbound>,
        profile: UserProfile,
        device_index: u8,
        session_age: Duration,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            outbound,
            profile,
            device_index,
            session_age,
            shutdown,
        }
    }

    fn build_reply(&self, peer: SocketAddrV4) -> Option<Bytes> {
        let binding = self.outbound.route(*peer.ip())?;
        let reply_to = binding.resolved_unicast_addr()?;
        let register = packet::factory()
            .new_session(self.session_age)
            .with_profile(
                self.profile.username(),
                self.profile.display_name(),
                self.profile.email(),
            )
            .and_then(|stage| stage.for_device(&reply_to.to_string(), self.device_index));
        match register.and_then(|packet| event::encode(&Packet::Register(packet))) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "Failed to build register reply");
                None
            }
        }
    }
}

#[async_trait]
impl BroadcastListener for RegisterReplier {
    async fn handle_register(&self, packet: &RegisterPacket) {
        if packet.header().session_id == packet::process_session_id() {
            return;
        }
        let peer: SocketAddrV4 = match packet.reply_to.parse() {
            Ok(addr) => addr,
            Err(_) => {
                warn!(reply_to = %packet.reply_to, "Peer announced an unusable reply-to");
                return;
            }
        };
        let Some(frame) = self.build_reply(peer) else {
            debug!(%peer, "No listener covers the new peer; not replying");
            return;
        };

        let outbound = self.outbound.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut attempt = 0u32;
            loop {
                match outbound.send_unicast(peer, &frame).await {
                    Ok(()) => {
                        debug!(%peer, "Register reply sent");
                        return;
                    }
                    Err(e) => {
                        attempt += 1;
                        warn!(%peer, attempt, error = %e, "Register reply failed, retrying");
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(REPLY_RETRY_DELAY) => {}
                    _ = shutdown.recv() => return,
                }
            }
        });
    }

    async fn handle_ping(&self, _packet: &PingPacket) {}

    async fn handle_sign_off(&self, _packet: &SignOffPacket) {}

    async fn handle_end_of_broadcasts(&self) {}
}
