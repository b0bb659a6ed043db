//! Packet model and the process-wide packet builder.

pub mod builder;
pub mod types;

pub use builder::{factory, process_session_id, PacketFactory};
pub use types::{Packet, PacketHeader, PingPacket, RegisterPacket, SignOffPacket};
