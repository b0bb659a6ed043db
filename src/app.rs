//! Application event listener: translates presence events into peer
//! directory updates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lamess_domain::{PeerDirectory, Session};
use lamess_presence::dispatcher::{BroadcastListener, MessageEvent, MessageListener};
use lamess_presence::packet::{PingPacket, RegisterPacket, SignOffPacket};

/// Sentinel pushed when the message pipeline ends.
pub const END_OF_MESSAGES: u8 = 1;
/// Sentinel pushed when the broadcast pipeline ends.
pub const END_OF_BROADCASTS: u8 = 2;

/// Listens to both pipelines: direct messages are logged for the user,
/// broadcasts keep the peer directory current.
pub struct AppEventListener {
    directory: Arc<PeerDirectory>,
    done_tx: mpsc::Sender<u8>,
}

impl AppEventListener {
    /// Create a listener that reports end-of-stream on `done_tx`.
    pub fn new(directory: Arc<PeerDirectory>, done_tx: mpsc::Sender<u8>) -> Self {
        Self { directory, done_tx }
    }
}

#[async_trait]
impl MessageListener for AppEventListener {
    async fn handle_message(&self, event: MessageEvent) {
        info!(message = %event.text(), "Message received");
    }

    async fn handle_end_of_messages(&self) {
        let _ = self.done_tx.send(END_OF_MESSAGES).await;
    }
}

#[async_trait]
impl BroadcastListener for AppEventListener {
    async fn handle_register(&self, packet: &RegisterPacket) {
        debug!(session_id = %packet.header().session_id, "Peer register");
        let profile = match packet.profile() {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Peer announced an invalid profile");
                return;
            }
        };
        let user = match self.directory.new_user(&profile).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to record peer user");
                return;
            }
        };
        let mut session = Session::new(
            &packet.header().session_id,
            packet.device_preference_index,
            packet.expiry_time(),
            &packet.reply_to,
        );
        if let Err(e) = self.directory.add_session(&user, &mut session).await {
            warn!(
                username = profile.username(),
                error = %e,
                "Failed to attach peer session"
            );
        }
    }

    async fn handle_ping(&self, packet: &PingPacket) {
        debug!(session_id = %packet.header.session_id, "Peer ping");
        if packet.expiry_time <= Utc::now() {
            return;
        }
        match self.directory.session_by_id(&packet.header.session_id).await {
            Ok(Some(mut session)) => {
                if let Err(e) = self.directory.renew(&mut session, packet.expiry_time).await {
                    warn!(
                        session_id = %packet.header.session_id,
                        error = %e,
                        "Failed to renew peer session"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session lookup failed"),
        }
    }

    async fn handle_sign_off(&self, packet: &SignOffPacket) {
        debug!(session_id = %packet.header.session_id, "Peer sign-off");
        match self.directory.session_by_id(&packet.header.session_id).await {
            Ok(Some(mut session)) => {
                if let Err(e) = self.directory.sign_off(&mut session).await {
                    warn!(
                        session_id = %packet.header.session_id,
                        error = %e,
                        "Failed to sign peer session off"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session lookup failed"),
        }
    }

    async fn handle_end_of_broadcasts(&self) {
        let _ = self.done_tx.send(END_OF_BROADCASTS).await;
    }
}
