//! Error types for the WebSocket protocol engine.
//!
//! Protocol violations detected while decoding are recorded on the
//! [`Connection`](crate::Connection) and returned from every later call, so the
//! owning layer can abort the link with the status code from
//! [`Error::close_code`].

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, encoding or closing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Generic protocol violation (unexpected continuation, bad close payload, ...).
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Unmasked client frame received by a server.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame received by a client.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Control frame without the FIN bit.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Extended length that fits a shorter encoding.
    #[error("Non-minimal length encoding: {len} sent in {width}-bit field")]
    NonMinimalLength {
        /// Decoded payload length.
        len: u64,
        /// Width of the extended length field that carried it.
        width: u8,
    },

    /// Frame payload exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Announced payload size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Invalid UTF-8 in a text message or close reason.
    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Close code that must not appear on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// A close frame was already sent on this connection.
    #[error("Close frame already sent")]
    CloseAlreadySent,

    /// Connection is closing or closed.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// Header value that would break the handshake response.
    #[error("Invalid header value for {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl Error {
    /// Close status code the owning layer should send when failing the
    /// connection because of this error.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => 1009,
            Error::InvalidUtf8 => 1007,
            Error::ConnectionClosed(_) | Error::CloseAlreadySent => 1000,
            Error::InvalidHeaderValue { .. } => 1011,
            _ => 1002,
        }
    }

    /// Whether this error is a violation by the remote peer.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        !matches!(
            self,
            Error::CloseAlreadySent
                | Error::ConnectionClosed(_)
                | Error::InvalidHeaderValue { .. }
        )
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameTooLarge {
            size: 20_000_000,
            max: 16_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Frame too large: 20000000 bytes (max: 16000000)"
        );

        let err = Error::NonMinimalLength { len: 5, width: 16 };
        assert_eq!(
            err.to_string(),
            "Non-minimal length encoding: 5 sent in 16-bit field"
        );
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(Error::ReservedOpcode(0x3).close_code(), 1002);
        assert_eq!(Error::UnmaskedClientFrame.close_code(), 1002);
        assert_eq!(Error::InvalidUtf8.close_code(), 1007);
        assert_eq!(Error::FrameTooLarge { size: 2, max: 1 }.close_code(), 1009);
        assert_ne!(Error::ControlFrameTooLarge(200).close_code(), 0);
    }

    #[test]
    fn test_protocol_violation_classification() {
        assert!(Error::MaskedServerFrame.is_protocol_violation());
        assert!(Error::NonMinimalLength { len: 1, width: 64 }.is_protocol_violation());
        assert!(!Error::CloseAlreadySent.is_protocol_violation());
        assert!(!Error::ConnectionClosed(Some(1000)).is_protocol_violation());
    }

    #[test]
    fn test_error_from_utf8() {
        let bytes = [0xffu8, 0xfe];
        let err: Error = std::str::from_utf8(&bytes).unwrap_err().into();
        assert_eq!(err, Error::InvalidUtf8);
    }

    #[test]
    fn test_error_clone() {
        let err = Error::ProtocolViolation("Unexpected continuation frame".into());
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
