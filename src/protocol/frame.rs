//! WebSocket frame header model (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                     Masking key (if present)                  |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! Fields are read and written one byte at a time; nothing here depends on
//! struct layout.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest length carried directly in the second header byte.
pub(crate) const MAX_INLINE_LEN: u64 = 125;
/// Marker for a 16-bit extended length.
pub(crate) const LEN_16_MARKER: u8 = 126;
/// Marker for a 64-bit extended length.
pub(crate) const LEN_64_MARKER: u8 = 127;

pub(crate) const FIN_BIT: u8 = 0x80;
pub(crate) const RSV1_BIT: u8 = 0x40;
pub(crate) const RSV2_BIT: u8 = 0x20;
pub(crate) const RSV3_BIT: u8 = 0x10;
pub(crate) const MASK_BIT: u8 = 0x80;

/// Position of a data frame within its message, as seen by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentState {
    /// First piece of a message that continues.
    Start,
    /// Middle piece of a message.
    Continue,
    /// Last piece; the message is complete.
    Finish,
}

impl FragmentState {
    /// State of a complete data frame, from its FIN bit and opcode.
    #[must_use]
    pub const fn of_frame(fin: bool, opcode: OpCode) -> Self {
        match (fin, opcode) {
            (true, _) => FragmentState::Finish,
            (false, OpCode::Continuation) => FragmentState::Continue,
            (false, _) => FragmentState::Start,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, FragmentState::Finish)
    }
}

/// Parsed or to-be-written frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1. Must be 0 unless an extension is negotiated.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    pub opcode: OpCode,
    /// Masking key, present on client-to-server frames.
    pub mask: Option<[u8; 4]>,
    pub payload_len: u64,
}

impl FrameHeader {
    /// Header for an unmasked frame with no reserved bits.
    #[must_use]
    pub const fn new(fin: bool, opcode: OpCode, payload_len: u64) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload_len,
        }
    }

    #[must_use]
    pub const fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    /// First header byte: FIN, RSV1-3 and opcode.
    #[must_use]
    pub const fn first_byte(&self) -> u8 {
        let mut byte = self.opcode.as_u8();
        if self.fin {
            byte |= FIN_BIT;
        }
        if self.rsv1 {
            byte |= RSV1_BIT;
        }
        if self.rsv2 {
            byte |= RSV2_BIT;
        }
        if self.rsv3 {
            byte |= RSV3_BIT;
        }
        byte
    }

    /// Size of the encoded header, including extended length and mask key.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let mask_size = if self.mask.is_some() { 4 } else { 0 };
        2 + extended_len_size(self.payload_len) + mask_size
    }

    /// Check the RFC rules a header must satisfy regardless of direction.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload_len > MAX_INLINE_LEN {
                return Err(Error::ControlFrameTooLarge(
                    usize::try_from(self.payload_len).unwrap_or(usize::MAX),
                ));
            }
        }
        Ok(())
    }

    /// Append the header bytes, always using the minimal length encoding.
    pub fn write(&self, out: &mut BytesMut) {
        out.reserve(self.encoded_len());
        out.put_u8(self.first_byte());

        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };
        let len = self.payload_len;
        if len <= MAX_INLINE_LEN {
            out.put_u8(mask_bit | len as u8);
        } else if len <= u64::from(u16::MAX) {
            out.put_u8(mask_bit | LEN_16_MARKER);
            out.put_u16(len as u16);
        } else {
            out.put_u8(mask_bit | LEN_64_MARKER);
            out.put_u64(len);
        }

        if let Some(key) = self.mask {
            out.put_slice(&key);
        }
    }
}

/// Bytes of extended length that follow the second header byte.
#[inline]
#[must_use]
pub const fn extended_len_size(payload_len: u64) -> usize {
    if payload_len <= MAX_INLINE_LEN {
        0
    } else if payload_len <= u16::MAX as u64 {
        2
    } else {
        8
    }
}

/// Total wire size of a frame carrying `payload_len` bytes.
#[inline]
#[must_use]
pub const fn frame_len(payload_len: usize, masked: bool) -> usize {
    let mask_size = if masked { 4 } else { 0 };
    2 + extended_len_size(payload_len as u64) + mask_size + payload_len
}
