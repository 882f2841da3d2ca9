//! Error types for the transport core.

use thiserror::Error;

/// Errors surfaced by the packet codec.
///
/// Every variant carries enough context for the caller to know which field
/// failed; the codec itself never logs-and-rethrows. [`Error::Authentication`]
/// is the one recoverable case: the packet is dropped silently and the caller
/// may count it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The version field holds a value this endpoint does not speak.
    #[error("unsupported QUIC version {0:#010x}")]
    UnknownVersion(u32),

    /// Wire bytes violate the protocol (malformed varint, length overrun, ...).
    #[error("malformed packet: {0}")]
    Protocol(&'static str),

    /// The first byte does not carry a recognized long-header type marker.
    #[error("first byte {0:#04x} is not a recognized long-header packet type")]
    InvalidPacketType(u8),

    /// AEAD open failed; the packet must be dropped without response.
    #[error("payload authentication failed")]
    Authentication,

    /// A recognized-but-unsupported frame codepoint.
    #[error("frame type {0:#04x} is not implemented")]
    NotYetImplemented(u8),

    /// Connection id length outside the 3..=18 the nibble encoding can carry.
    #[error("connection id length {0} is outside 3..=18")]
    ConnectionIdLength(usize),

    /// The built datagram would not fit in one MTU-sized packet.
    #[error("datagram size {0} exceeds the 1500 byte maximum")]
    PacketTooLarge(usize),

    /// A precondition the caller upholds was violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Whether the error terminates the connection.
    ///
    /// Authentication failures are dropped and counted; everything else is
    /// fatal at this layer (a caller may still downgrade
    /// [`Error::NotYetImplemented`]).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Authentication)
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_is_recoverable() {
        assert!(!Error::Authentication.is_fatal());
        assert!(Error::UnknownVersion(0xdead_beef).is_fatal());
        assert!(Error::Protocol("truncated").is_fatal());
        assert!(Error::NotYetImplemented(0x20).is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            Error::UnknownVersion(0xff00_0099).to_string(),
            "unsupported QUIC version 0xff000099"
        );
        assert_eq!(
            Error::ConnectionIdLength(21).to_string(),
            "connection id length 21 is outside 3..=18"
        );
    }
}
