//! The `"<EVENT-NAME>\n<JSON>"` datagram codec.
//!
//! The first line of a datagram, up to the first newline, names the
//! event; everything after is the packet JSON. Unknown names decode to
//! [`Event::Unknown`], which the dispatcher drops.

use bytes::Bytes;

use lamess_core::error::AppError;
use lamess_core::result::AppResult;

use crate::packet::{Packet, PingPacket, RegisterPacket, SignOffPacket};

/// Wire name of Register events.
pub const REGISTER_EVENT: &str = "REGISTER";
/// Wire name of Ping events.
pub const PING_EVENT: &str = "PING";
/// Wire name of SignOff events.
pub const SIGNOFF_EVENT: &str = "SIGNOFF";

/// Largest datagram the listeners will read. Oversize datagrams are
/// truncated at this bound and will fail to decode.
pub const MAX_DATAGRAM_SIZE: usize = 10 * 1024;

/// A decoded broadcast datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A peer announced itself.
    Register(RegisterPacket),
    /// A peer renewed its presence.
    Ping(PingPacket),
    /// A peer signed off.
    SignOff(SignOffPacket),
    /// A frame with an event name this layer does not support.
    Unknown {
        /// The unrecognized first line.
        name: String,
    },
}

impl Event {
    /// The `(session, packet)` identifier pair, when the event carries
    /// one.
    pub fn identifier(&self) -> Option<(&str, u64)> {
        match self {
            Self::Register(p) => Some((&p.header().session_id, p.header().packet_id)),
            Self::Ping(p) => Some((&p.header.session_id, p.header.packet_id)),
            Self::SignOff(p) => Some((&p.header.session_id, p.header.packet_id)),
            Self::Unknown { .. } => None,
        }
    }
}

/// Frame a packet for transport.
pub fn encode(packet: &Packet) -> AppResult<Bytes> {
    let (name, json) = match packet {
        Packet::Register(p) => (REGISTER_EVENT, serde_json::to_string(p)?),
        Packet::Ping(p) => (PING_EVENT, serde_json::to_string(p)?),
        Packet::SignOff(p) => (SIGNOFF_EVENT, serde_json::to_string(p)?),
    };
    let mut frame = String::with_capacity(name.len() + 1 + json.len());
    frame.push_str(name);
    frame.push('\n');
    frame.push_str(&json);
    Ok(Bytes::from(frame))
}

/// Parse an inbound datagram into a typed event.
pub fn decode(data: &[u8]) -> AppResult<Event> {
    let newline = data.iter().position(|&b| b == b'\n');
    let (name_bytes, body) = match newline {
        Some(index) => (&data[..index], &data[index + 1..]),
        None => (data, &data[data.len()..]),
    };
    let name = std::str::from_utf8(name_bytes)
        .map_err(|e| AppError::with_source(
            lamess_core::error::ErrorKind::Serialization,
            "Event name is not UTF-8",
            e,
        ))?;

    match name {
        REGISTER_EVENT => Ok(Event::Register(serde_json::from_slice(body)?)),
        PING_EVENT => Ok(Event::Ping(serde_json::from_slice(body)?)),
        SIGNOFF_EVENT => Ok(Event::SignOff(serde_json::from_slice(body)?)),
        other => Ok(Event::Unknown {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketHeader;
    use chrono::{TimeZone, Utc};

    fn register_fixture() -> RegisterPacket {
        RegisterPacket {
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
        }
    }

    #[test]
    fn test_encode_register_frame_shape() {
        let frame = encode(&Packet::Register(register_fixture())).expect("encode");
        let text = std::str::from_utf8(&frame).expect("utf-8");
        let (name, json) = text.split_once('\n').expect("one newline");
        assert_eq!(name, "REGISTER");
        assert!(json.contains("\"PacketID\":42"));
        assert!(json.contains("\"SessionID\":\"S1\""));
    }

    #[test]
    fn test_register_round_trip() {
        let original = register_fixture();
        let frame = encode(&Packet::Register(original.clone())).expect("encode");
        match decode(&frame).expect("decode") {
            Event::Register(decoded) => assert_eq!(decoded, original),
            other => panic!("expected register, got {other:?}"),
        }
    }

    #[test]
    fn test_ping_round_trip() {
        let original = PingPacket {
            header: PacketHeader {
                packet_id: 43,
                session_id: "S1".to_string(),
            },
            expiry_time: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        };
        let frame = encode(&Packet::Ping(original.clone())).expect("encode");
        assert!(frame.starts_with(b"PING\n"));
        match decode(&frame).expect("decode") {
            Event::Ping(decoded) => assert_eq!(decoded, original),
            other => panic!("expected ping, got {other:?}"),
        }
    }

    #[test]
    fn test_sign_off_round_trip() {
        let original = SignOffPacket {
            header: PacketHeader {
                packet_id: 44,
                session_id: "S1".to_string(),
            },
        };
        let frame = encode(&Packet::SignOff(original.clone())).expect("encode");
        assert!(frame.starts_with(b"SIGNOFF\n"));
        match decode(&frame).expect("decode") {
            Event::SignOff(decoded) => assert_eq!(decoded, original),
            other => panic!("expected sign-off, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_name() {
        match decode(b"GOSSIP\n{}").expect("decode") {
            Event::Unknown { name } => assert_eq!(name, "GOSSIP"),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_known_name_with_bad_json_is_an_error() {
        assert!(decode(b"PING\nnot json").is_err());
        assert!(decode(b"PING\n").is_err());
    }

    #[test]
    fn test_frame_without_newline_is_unknown() {
        match decode(b"junk with no separator").expect("decode") {
            Event::Unknown { name } => assert_eq!(name, "junk with no separator"),
            other => panic!("expected unknown, got {other:?}"),
        }
    }
}
