//! Close-handshake progress of a connection.

use std::fmt;

/// Where the connection stands in the close handshake.
///
/// A [`Connection`](super::Connection) starts `Open` because it is created
/// after the HTTP upgrade has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Data flows in both directions.
    #[default]
    Open,
    /// We sent a close frame and are waiting for the peer's.
    Closing,
    /// The peer's close frame was received; no further input is processed.
    Closed,
}

impl ConnectionState {
    /// Inbound frames are still decoded.
    #[inline]
    #[must_use]
    pub const fn can_receive(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Data frames may be queued.
    #[inline]
    #[must_use]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        })
    }
}
