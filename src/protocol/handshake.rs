//! Handshake key derivation (RFC 6455 Section 4.2.2).
//!
//! Only the pieces the protocol engine owns live here: turning a
//! `Sec-WebSocket-Key` into its `Sec-WebSocket-Accept` value and writing the
//! fixed `101` response. Parsing the HTTP upgrade request is left to the
//! transport.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::encoder::MaskGenerator;

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Status line and fixed headers of a successful upgrade response.
pub const SWITCHING_PROTOCOLS_HEADERS: &str =
    "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n";

/// SHA-1 of `key` followed by [`WS_GUID`].
#[must_use]
pub fn compute_accept_digest(key: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(WS_GUID.as_bytes());
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
///
/// ```
/// use wscore::compute_accept_key;
///
/// assert_eq!(
///     compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    BASE64.encode(compute_accept_digest(key.as_bytes()))
}

/// Fresh `Sec-WebSocket-Key` for a client request: 16 random bytes, base64.
#[must_use]
pub fn generate_key() -> String {
    let mut nonce = [0u8; 16];
    if getrandom::getrandom(&mut nonce).is_err() {
        let mut masks = MaskGenerator::new();
        for chunk in nonce.chunks_exact_mut(4) {
            chunk.copy_from_slice(&masks.next_key());
        }
    }
    BASE64.encode(nonce)
}

/// Whether a server's `Sec-WebSocket-Accept` matches the key we sent.
#[must_use]
pub fn verify_accept_key(key: &str, accept: &str) -> bool {
    compute_accept_key(key) == accept.trim()
}

/// Reject header values that would split the response.
///
/// # Errors
///
/// `Error::InvalidHeaderValue` if `value` contains CR or LF.
pub fn validate_header_value(header: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: header.to_owned(),
            reason: "contains CR or LF characters".to_owned(),
        });
    }
    Ok(())
}

/// Server side of the upgrade: the `101 Switching Protocols` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub accept: String,
    /// Selected subprotocol, if any.
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Response accepting the given `Sec-WebSocket-Key`.
    #[must_use]
    pub fn for_key(key: &str) -> Self {
        Self {
            accept: compute_accept_key(key),
            protocol: None,
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Append the full response head, including the terminating blank line.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHeaderValue` if the protocol contains CR or LF; nothing
    /// is written in that case.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        if let Some(protocol) = &self.protocol {
            validate_header_value("Sec-WebSocket-Protocol", protocol)?;
        }

        buf.extend_from_slice(SWITCHING_PROTOCOLS_HEADERS.as_bytes());
        buf.extend_from_slice(b"Sec-WebSocket-Accept: ");
        buf.extend_from_slice(self.accept.as_bytes());
        buf.extend_from_slice(b"\r\n");
        if let Some(protocol) = &self.protocol {
            buf.extend_from_slice(b"Sec-WebSocket-Protocol: ");
            buf.extend_from_slice(protocol.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}
