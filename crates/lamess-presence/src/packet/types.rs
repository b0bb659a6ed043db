//! Wire packet definitions.
//!
//! Register extends Ping extends the base header; the extension chain is
//! modeled by struct composition with `serde(flatten)`, so the JSON
//! keeps every field at the top level. Field names on the wire use
//! capitalised initials (`PacketID`, `SessionID`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lamess_core::result::AppResult;
use lamess_entity::profile::UserProfile;

/// Fields shared by every packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Monotonic per-process packet sequence number.
    #[serde(rename = "PacketID")]
    pub packet_id: u64,
    /// The announcing process's session identifier.
    #[serde(rename = "SessionID")]
    pub session_id: String,
}

/// Presence keep-alive: the peer's session stays live until the carried
/// expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPacket {
    /// Shared packet header.
    #[serde(flatten)]
    pub header: PacketHeader,
    /// Instant until which the sender's session should be considered
    /// live.
    #[serde(rename = "ExpiryTime")]
    pub expiry_time: DateTime<Utc>,
}

/// Announcement broadcast when a device comes up, and sent unicast as a
/// reply to newly discovered peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPacket {
    /// Shared ping fields (header + expiry).
    #[serde(flatten)]
    pub ping: PingPacket,
    /// Preference index of the announcing device.
    #[serde(rename = "DevicePreferenceIndex")]
    pub device_preference_index: u8,
    /// `ip:port` for direct messages to the announcing session.
    #[serde(rename = "ReplyTo")]
    pub reply_to: String,
    /// Announcing user's handle.
    #[serde(rename = "Username")]
    pub username: String,
    /// Announcing user's display name.
    #[serde(rename = "DisplayName")]
    pub display_name: String,
    /// Announcing user's e-mail.
    #[serde(rename = "Email")]
    pub email: String,
}

impl RegisterPacket {
    /// Shared packet header.
    pub fn header(&self) -> &PacketHeader {
        &self.ping.header
    }

    /// Session expiry carried by the announcement.
    pub fn expiry_time(&self) -> DateTime<Utc> {
        self.ping.expiry_time
    }

    /// The announced identity as a validated profile value.
    pub fn profile(&self) -> AppResult<UserProfile> {
        UserProfile::new(&self.username, &self.display_name, &self.email)
    }
}

/// Sent when a device exits gracefully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOffPacket {
    /// Shared packet header.
    #[serde(flatten)]
    pub header: PacketHeader,
}

/// Any packet that can cross the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Device announcement.
    Register(RegisterPacket),
    /// Presence keep-alive.
    Ping(PingPacket),
    /// Graceful exit.
    SignOff(SignOffPacket),
}

impl Packet {
    /// Shared packet header.
    pub fn header(&self) -> &PacketHeader {
        match self {
            Self::Register(p) => p.header(),
            Self::Ping(p) => &p.header,
            Self::SignOff(p) => &p.header,
        }
    }

    /// Monotonic packet sequence number.
    pub fn packet_id(&self) -> u64 {
        self.header().packet_id
    }

    /// Announcing session identifier.
    pub fn session_id(&self) -> &str {
        &self.header().session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_register_json_is_flat_with_wire_names() {
        let packet = RegisterPacket {
            ping: PingPacket {
                header: PacketHeader {
                    packet_id: 42,
                    session_id: "S1".to_string(),
                },
                expiry_time: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            },
            device_preference_index: 1,
            reply_to: "127.0.0.1:30000".to_string(),
            username: "nicename".to_string(),
            display_name: "What to Show".to_string(),
            email: "user@email.co".to_string(),
        };
        let json = serde_json::to_string(&packet).expect("serialize");
        assert!(json.contains("\"PacketID\":42"));
        assert!(json.contains("\"SessionID\":\"S1\""));
        assert!(json.contains("\"ExpiryTime\":\"2030-01-01T00:00:00Z\""));
        assert!(json.contains("\"DevicePreferenceIndex\":1"));
        assert!(json.contains("\"ReplyTo\":\"127.0.0.1:30000\""));
        // No nested objects; the extension chain flattens.
        assert_eq!(json.matches('{').count(), 1);
    }

    #[test]
    fn test_register_profile_round_trip() {
        let packet = RegisterPacket {
            ping: PingPacket {
                header: PacketHeader {
                    packet_id: 1,
                    session_id: "S1".to_string(),
                },
                expiry_time: Utc::now(),
            },
            device_preference_index: 2,
            reply_to: "10.0.0.1:30000".to_string(),
            username: "nicename".to_string(),
            display_name: "What to Show".to_string(),
            email: "user@email.co".to_string(),
        };
        let profile = packet.profile().expect("valid profile");
        assert_eq!(profile.username(), "nicename");
    }
}
