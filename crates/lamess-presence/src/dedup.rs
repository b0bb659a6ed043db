//! Deduplication of multicast datagrams.
//!
//! A node receives its own broadcasts back and may receive a peer's
//! broadcast once per listening interface. The registry tracks, per
//! announcing session, which packet IDs have already been observed so
//! only the first copy is dispatched.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::event::Event;

/// Observed state for one announcing session.
#[derive(Debug)]
struct RegistryEntry {
    /// Liveness horizon, renewed by accepted pings.
    expiry_time: DateTime<Utc>,
    /// Packet IDs seen from this session, with per-ID hit counts.
    packet_registry: HashMap<u64, u32>,
}

/// Session-keyed registry of observed packet IDs.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl DedupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `event` is the first observation of its packet.
    ///
    /// A session becomes known only through a Register event; Ping and
    /// SignOff for unknown sessions are rejected. A repeated packet ID
    /// increments its hit count and is rejected. An accepted Ping also
    /// renews the session entry's expiry to the ping's expiry.
    pub fn is_not_duplicate(&self, event: &Event) -> bool {
        let Some((session_id, packet_id)) = event.identifier() else {
            return false;
        };

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(session_id) {
            None => match event {
                Event::Register(packet) => {
                    entries.insert(
                        session_id.to_string(),
                        RegistryEntry {
                            expiry_time: packet.expiry_time(),
                            packet_registry: HashMap::from([(packet_id, 1)]),
                        },
                    );
                    true
                }
                _ => false,
            },
            Some(entry) => {
                if let Some(hits) = entry.packet_registry.get_mut(&packet_id) {
                    *hits += 1;
                    return false;
                }
                entry.packet_registry.insert(packet_id, 1);
                if let Event::Ping(packet) = event {
                    entry.expiry_time = packet.expiry_time;
                }
                true
            }
        }
    }

    /// Drop entries whose expiry precedes `now`.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expiry_time >= now);
    }

    /// The tracked expiry for a session, if the session is known.
    pub fn entry_expiry(&self, session_id: &str) -> Option<DateTime<Utc>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(session_id).map(|entry| entry.expiry_time)
    }

    /// How many times the given packet has been observed.
    pub fn hit_count(&self, session_id: &str, packet_id: u64) -> u32 {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(session_id)
            .and_then(|entry| entry.packet_registry.get(&packet_id).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketHeader, PingPacket, RegisterPacket, SignOffPacket};
    use chrono::Duration;

    fn register(session_id: &str, packet_id: u64, expiry: DateTime<Utc>) -> Event {
        Event::Register(RegisterPacket {
            ping: PingPacket {
                header: PacketHeader {
                    packet_id,
                    session_id: session_id.to_string(),
                },
                expiry_time: expiry,
            },
            device_preference_index: 1,
            reply_to: "127.0.0.1:30000".to_string(),
            username: "nicename".to_string(),
            display_name: "What to Show".to_string(),
            email: "user@email.co".to_string(),
        })
    }

    fn ping(session_id: &str, packet_id: u64, expiry: DateTime<Utc>) -> Event {
        Event::Ping(PingPacket {
            header: PacketHeader {
                packet_id,
                session_id: session_id.to_string(),
            },
            expiry_time: expiry,
        })
    }

    fn sign_off(session_id: &str, packet_id: u64) -> Event {
        Event::SignOff(SignOffPacket {
            header: PacketHeader {
                packet_id,
                session_id: session_id.to_string(),
            },
        })
    }

    #[test]
    fn test_replayed_register_accepted_once() {
        let registry = DedupRegistry::new();
        let event = register("S1", 42, Utc::now() + Duration::minutes(5));

        assert!(registry.is_not_duplicate(&event));
        assert!(!registry.is_not_duplicate(&event));
        assert_eq!(registry.hit_count("S1", 42), 2);
    }

    #[test]
    fn test_ping_before_register_rejected() {
        let registry = DedupRegistry::new();
        assert!(!registry.is_not_duplicate(&ping("S1", 7, Utc::now() + Duration::minutes(5))));
        assert!(!registry.is_not_duplicate(&sign_off("S1", 8)));
        assert_eq!(registry.entry_expiry("S1"), None);
    }

    #[test]
    fn test_accepted_ping_renews_entry_expiry() {
        let registry = DedupRegistry::new();
        registry.is_not_duplicate(&register("S1", 42, Utc::now() + Duration::minutes(5)));

        let renewed = Utc::now() + Duration::minutes(10);
        assert!(registry.is_not_duplicate(&ping("S1", 43, renewed)));
        assert_eq!(registry.entry_expiry("S1"), Some(renewed));
    }

    #[test]
    fn test_rejected_ping_does_not_renew() {
        let registry = DedupRegistry::new();
        let initial = Utc::now() + Duration::minutes(5);
        registry.is_not_duplicate(&register("S1", 42, initial));

        // Same packet id replayed with a different expiry.
        assert!(!registry.is_not_duplicate(&ping("S1", 42, Utc::now() + Duration::hours(2))));
        assert_eq!(registry.entry_expiry("S1"), Some(initial));
    }

    #[test]
    fn test_new_packet_id_for_known_session_accepted() {
        let registry = DedupRegistry::new();
        registry.is_not_duplicate(&register("S1", 42, Utc::now() + Duration::minutes(5)));
        assert!(registry.is_not_duplicate(&sign_off("S1", 44)));
    }

    #[test]
    fn test_sweep_drops_expired_entries_only() {
        let registry = DedupRegistry::new();
        registry.is_not_duplicate(&register("dead", 1, Utc::now() - Duration::seconds(30)));
        registry.is_not_duplicate(&register("live", 2, Utc::now() + Duration::minutes(5)));

        registry.sweep(Utc::now());

        assert_eq!(registry.entry_expiry("dead"), None);
        assert!(registry.entry_expiry("live").is_some());
        // A dropped session must register again before pings count.
        assert!(!registry.is_not_duplicate(&ping("dead", 3, Utc::now() + Duration::minutes(5))));
    }
}
