//! Event dispatch to subscribed listeners.
//!
//! Two long-running loops consume the raw byte channels fed by the
//! socket receive tasks. Unicast bytes become [`MessageEvent`]s;
//! multicast bytes are decoded, dedup-checked, and fanned out by type.
//! When a loop's source closes, every subscriber receives its terminal
//! callback exactly once.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::dedup::DedupRegistry;
use crate::event::{self, Event};
use crate::packet::{PingPacket, RegisterPacket, SignOffPacket};

/// A direct message received on the unicast port.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    payload: Bytes,
}

impl MessageEvent {
    /// Wrap a raw datagram payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Receives direct messages.
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// A direct message arrived.
    async fn handle_message(&self, event: MessageEvent);
    /// No more messages will be delivered.
    async fn handle_end_of_messages(&self);
}

/// Receives decoded, deduplicated broadcast events.
#[async_trait]
pub trait BroadcastListener: Send + Sync {
    /// A peer announced itself.
    async fn handle_register(&self, packet: &RegisterPacket);
    /// A peer renewed its presence.
    async fn handle_ping(&self, packet: &PingPacket);
    /// A peer signed off.
    async fn handle_sign_off(&self, packet: &SignOffPacket);
    /// No more broadcasts will be delivered.
    async fn handle_end_of_broadcasts(&self);
}

/// Ordered set of subscribers with identity-based membership.
///
/// Fan-out works on a snapshot, so a listener removed mid-dispatch is
/// never invoked after `remove` returns.
pub(crate) struct SubscriberSet<L: ?Sized> {
    items: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> SubscriberSet<L> {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    fn position(items: &[Arc<L>], listener: &Arc<L>) -> Option<usize> {
        // Compare data pointers only; `Arc::ptr_eq` on trait objects also
        // compares vtable pointers, which are not stable across coercion
        // sites.
        let target = Arc::as_ptr(listener) as *const ();
        items
            .iter()
            .position(|item| std::ptr::eq(Arc::as_ptr(item) as *const (), target))
    }

    /// Append a subscriber. Returns true iff the set grew.
    pub(crate) fn add(&self, listener: Arc<L>) -> bool {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if Self::position(&items, &listener).is_some() {
            return false;
        }
        items.push(listener);
        true
    }

    /// Put a subscriber ahead of every existing one.
    pub(crate) fn add_first(&self, listener: Arc<L>) {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if Self::position(&items, &listener).is_none() {
            items.insert(0, listener);
        }
    }

    /// Remove a subscriber by identity. Returns true iff the set shrank.
    pub(crate) fn remove(&self, listener: &Arc<L>) -> bool {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        match Self::position(&items, listener) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current subscribers in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Pump unicast payloads to the message listeners until the channel
/// closes or shutdown is signalled, then notify end-of-messages.
pub(crate) async fn run_message_loop(
    mut rx: mpsc::Receiver<Bytes>,
    listeners: Arc<SubscriberSet<dyn MessageListener>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(payload) => {
                    let event = MessageEvent::new(payload);
                    for listener in listeners.snapshot() {
                        listener.handle_message(event.clone()).await;
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    for listener in listeners.snapshot() {
        listener.handle_end_of_messages().await;
    }
}

/// Pump multicast datagrams through decode and dedup to the broadcast
/// listeners, then notify end-of-broadcasts.
pub(crate) async fn run_broadcast_loop(
    mut rx: mpsc::Receiver<Bytes>,
    listeners: Arc<SubscriberSet<dyn BroadcastListener>>,
    dedup: Arc<DedupRegistry>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(payload) => dispatch_broadcast(&payload, &listeners, &dedup).await,
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    for listener in listeners.snapshot() {
        listener.handle_end_of_broadcasts().await;
    }
}

async fn dispatch_broadcast(
    payload: &[u8],
    listeners: &SubscriberSet<dyn BroadcastListener>,
    dedup: &DedupRegistry,
) {
    let event = match event::decode(payload) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Dropping undecodable broadcast");
            return;
        }
    };
    if let Event::Unknown { name } = &event {
        debug!(name = %name, "Dropping unsupported broadcast event");
        return;
    }
    if !dedup.is_not_duplicate(&event) {
        debug!(identifier = ?event.identifier(), "Dropping duplicate broadcast");
        return;
    }

    let snapshot = listeners.snapshot();
    match &event {
        Event::Register(packet) => {
            for listener in &snapshot {
                listener.handle_register(packet).await;
            }
        }
        Event::Ping(packet) => {
            for listener in &snapshot {
                listener.handle_ping(packet).await;
            }
        }
        Event::SignOff(packet) => {
            for listener in &snapshot {
                listener.handle_sign_off(packet).await;
            }
        }
        Event::Unknown { .. } => {}
    }
}
