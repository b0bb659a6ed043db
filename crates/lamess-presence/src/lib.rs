//! UDP presence and transport engine for lamess.
//!
//! Provides:
//! - The packet model and the process-wide packet builder
//! - The `"<EVENT-NAME>\n<JSON>"` datagram codec
//! - Interface enumeration behind [`netif::InterfaceSource`]
//! - Per-interface UDP listener sets and receive loops
//! - Session/packet deduplication of multicast datagrams
//! - Typed event dispatch to subscribed listeners
//! - The [`engine::PresenceEngine`] tying it all together

pub mod dedup;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod listener;
pub mod netif;
pub mod packet;

mod reply;

pub use engine::PresenceEngine;
