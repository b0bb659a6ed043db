//! Process-wide packet builder.
//!
//! A single [`PacketFactory`] exists per process. It owns the session
//! identifier (a UUID v4 generated once at startup) and the packet
//! sequence counter; every packet it builds carries both. Register
//! packets are assembled through a staged fluent builder so the
//! session, profile, and device parts each validate their own inputs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use lamess_core::error::AppError;
use lamess_core::result::AppResult;
use lamess_core::validate;

use super::types::{PacketHeader, PingPacket, RegisterPacket, SignOffPacket};

static FACTORY: OnceLock<PacketFactory> = OnceLock::new();

/// The process-wide packet factory.
pub fn factory() -> &'static PacketFactory {
    FACTORY.get_or_init(PacketFactory::new)
}

/// The session identifier this process announces with.
pub fn process_session_id() -> &'static str {
    factory().session_id()
}

/// Builds packets stamped with the process session identifier and a
/// strictly monotonic packet sequence number.
#[derive(Debug)]
pub struct PacketFactory {
    session_id: String,
    packet_sequence: AtomicU64,
}

impl PacketFactory {
    fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            packet_sequence: AtomicU64::new(0),
        }
    }

    /// The session identifier stamped on every packet.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn next_header(&self) -> PacketHeader {
        PacketHeader {
            packet_id: self.packet_sequence.fetch_add(1, Ordering::SeqCst) + 1,
            session_id: self.session_id.clone(),
        }
    }

    /// Start building a Register announcement for a session that should
    /// stay live for `age` from now.
    pub fn new_session(&self, age: Duration) -> SessionBuilder {
        SessionBuilder {
            header: self.next_header(),
            expiry_time: Utc::now() + age,
        }
    }

    /// Build a Ping that renews this process's session for `age` from
    /// now.
    pub fn ping(&self, age: Duration) -> PingPacket {
        PingPacket {
            header: self.next_header(),
            expiry_time: Utc::now() + age,
        }
    }

    /// Build a SignOff for this process's session.
    pub fn sign_off(&self) -> SignOffPacket {
        SignOffPacket {
            header: self.next_header(),
        }
    }
}

/// Register builder stage carrying the session header and expiry.
#[derive(Debug)]
pub struct SessionBuilder {
    header: PacketHeader,
    expiry_time: DateTime<Utc>,
}

impl SessionBuilder {
    /// Attach the announcing user's identity.
    pub fn with_profile(
        self,
        username: &str,
        display_name: &str,
        email: &str,
    ) -> AppResult<ProfileBuilder> {
        if validate::is_blank(username)
            || validate::is_blank(display_name)
            || validate::is_blank(email)
        {
            return Err(AppError::invalid_input(
                "none of the user profile attributes are optional",
            ));
        }
        if !validate::is_alphanumeric_with_space(username)
            || !validate::is_alphanumeric_with_space(display_name)
        {
            return Err(AppError::invalid_input(
                "username and display name must be alphanumeric",
            ));
        }
        if !validate::is_valid_email(email) {
            return Err(AppError::invalid_input(format!(
                "email {email:?} is not well formatted"
            )));
        }
        Ok(ProfileBuilder {
            header: self.header,
            expiry_time: self.expiry_time,
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Register builder stage carrying the validated profile.
#[derive(Debug)]
pub struct ProfileBuilder {
    header: PacketHeader,
    expiry_time: DateTime<Utc>,
    username: String,
    display_name: String,
    email: String,
}

impl ProfileBuilder {
    /// Attach the device's reply-to address and preference index, and
    /// produce the finished Register packet.
    pub fn for_device(
        self,
        reply_to: &str,
        device_preference_index: u8,
    ) -> AppResult<RegisterPacket> {
        if validate::is_blank(reply_to) {
            return Err(AppError::invalid_input("no reply-to value provided"));
        }
        if !validate::is_valid_connection_string(reply_to) {
            return Err(AppError::invalid_input(format!(
                "reply-to {reply_to:?} is not in ip-address:port format"
            )));
        }
        Ok(RegisterPacket {
            ping: PingPacket {
                header: self.header,
                expiry_time: self.expiry_time,
            },
            device_preference_index,
            reply_to: reply_to.to_string(),
            username: self.username,
            display_name: self.display_name,
            email: self.email,
        })
    }
}
