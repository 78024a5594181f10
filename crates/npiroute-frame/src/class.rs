//! Message classes carried in the command type bits.
//!
//! The top three bits of `cmd0` select the class; the low five bits name the
//! subsystem and are opaque to the router.

use std::fmt;

/// Mask selecting the type bits of `cmd0`.
pub const TYPE_MASK: u8 = 0xE0;

/// Mask selecting the subsystem bits of `cmd0`.
pub const SUBSYSTEM_MASK: u8 = 0x1F;

/// Synchronous request (host to device, expects a response).
pub const SYNC_REQUEST: u8 = 0x20;

/// Asynchronous message (either direction, no response).
pub const ASYNC: u8 = 0x40;

/// Synchronous response (device to host only).
pub const SYNC_RESPONSE: u8 = 0x60;

/// Traffic class of one message crossing the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    Async,
    SyncRequest,
    SyncResponse,
}

impl MessageClass {
    /// Classify a message by its first command byte.
    pub fn from_cmd0(cmd0: u8) -> Option<Self> {
        match cmd0 & TYPE_MASK {
            ASYNC => Some(Self::Async),
            SYNC_REQUEST => Some(Self::SyncRequest),
            SYNC_RESPONSE => Some(Self::SyncResponse),
            _ => None,
        }
    }

    /// The type bits for this class.
    pub fn type_bits(self) -> u8 {
        match self {
            Self::Async => ASYNC,
            Self::SyncRequest => SYNC_REQUEST,
            Self::SyncResponse => SYNC_RESPONSE,
        }
    }

    /// Rewrite the type bits of `cmd0`, keeping the subsystem.
    pub fn apply_to(self, cmd0: u8) -> u8 {
        (cmd0 & SUBSYSTEM_MASK) | self.type_bits()
    }

    pub fn is_sync(self) -> bool {
        !matches!(self, Self::Async)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Async => "ASYNC",
            Self::SyncRequest => "SYNC_REQ",
            Self::SyncResponse => "SYNC_RSP",
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_type_bits() {
        assert_eq!(MessageClass::from_cmd0(0x21), Some(MessageClass::SyncRequest));
        assert_eq!(MessageClass::from_cmd0(0x45), Some(MessageClass::Async));
        assert_eq!(MessageClass::from_cmd0(0x6F), Some(MessageClass::SyncResponse));
        assert_eq!(MessageClass::from_cmd0(0x01), None);
        assert_eq!(MessageClass::from_cmd0(0x81), None);
    }

    #[test]
    fn apply_keeps_subsystem() {
        assert_eq!(MessageClass::SyncResponse.apply_to(0x27), 0x67);
        assert_eq!(MessageClass::Async.apply_to(0x61), 0x41);
    }
}
