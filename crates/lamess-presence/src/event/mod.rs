//! Event framing for UDP datagrams.

pub mod codec;

pub use codec::{decode, encode, Event, MAX_DATAGRAM_SIZE};
