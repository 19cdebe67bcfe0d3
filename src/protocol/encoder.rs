//! Outbound frame encoding.

use bytes::{BufMut, BytesMut};

use crate::connection::Role;
use crate::error::Result;
use crate::protocol::OpCode;
use crate::protocol::frame::FrameHeader;
use crate::protocol::mask::apply_mask;

/// Append one complete frame to `out`.
///
/// With `mask` set, the key follows the length field and the payload is
/// XORed with it; otherwise the payload is copied unchanged.
///
/// # Errors
///
/// - `Error::FragmentedControlFrame` if a control frame has FIN=0
/// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
pub fn encode_frame(
    out: &mut BytesMut,
    fin: bool,
    opcode: OpCode,
    payload: &[u8],
    mask: Option<[u8; 4]>,
) -> Result<()> {
    let header = FrameHeader::new(fin, opcode, payload.len() as u64).with_mask(mask);
    header.validate()?;

    out.reserve(header.encoded_len() + payload.len());
    header.write(out);

    let start = out.len();
    out.put_slice(payload);
    if let Some(key) = mask {
        apply_mask(&mut out[start..], key);
    }
    Ok(())
}

/// Source of per-frame masking keys.
///
/// Keys come from the OS RNG. If it is unavailable the generator falls back
/// to a mixed counter seeded at construction.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    counter: u32,
}

impl MaskGenerator {
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        if getrandom::getrandom(&mut seed).is_err() {
            use std::time::{SystemTime, UNIX_EPOCH};
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u32)
                .unwrap_or(0x1234_5678);
            seed = nanos.to_le_bytes();
        }
        Self {
            counter: u32::from_le_bytes(seed),
        }
    }

    /// A fresh key for the next frame.
    pub fn next_key(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        if getrandom::getrandom(&mut key).is_ok() {
            return key;
        }
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        c.wrapping_mul(0xC2B2_AE35).to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Role-aware frame encoder.
///
/// Clients mask every frame with a fresh key; servers never mask.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    role: Role,
    masks: MaskGenerator,
}

impl FrameEncoder {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            masks: MaskGenerator::new(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Encode a single-frame message (FIN set).
    ///
    /// # Errors
    ///
    /// See [`encode_frame`].
    pub fn encode(&mut self, out: &mut BytesMut, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.encode_fragment(out, opcode, payload, true)
    }

    /// Encode one frame with an explicit FIN bit.
    ///
    /// Starting a fragmented message is done by passing the data opcode with
    /// `fin = false`, then `OpCode::Continuation` frames, the last with
    /// `fin = true`.
    ///
    /// # Errors
    ///
    /// See [`encode_frame`].
    pub fn encode_fragment(
        &mut self,
        out: &mut BytesMut,
        opcode: OpCode,
        payload: &[u8],
        fin: bool,
    ) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.masks.next_key());
        encode_frame(out, fin, opcode, payload, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn encoded(fin: bool, opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_frame(&mut out, fin, opcode, payload, mask).unwrap();
        out.to_vec()
    }

    #[test]
    fn test_unmasked_text_frame() {
        assert_eq!(
            encoded(true, OpCode::Text, b"Hello", None),
            vec![0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]
        );
    }

    #[test]
    fn test_masked_text_frame_rfc_example() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        assert_eq!(
            encoded(true, OpCode::Text, b"Hello", Some(mask)),
            vec![0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_unfinished_frame_clears_fin() {
        let bytes = encoded(false, OpCode::Text, b"Hel", None);
        assert_eq!(bytes[0], 0x01);
        let bytes = encoded(true, OpCode::Continuation, b"lo", None);
        assert_eq!(bytes[0], 0x80);
    }

    #[test]
    fn test_extended_lengths() {
        let bytes = encoded(true, OpCode::Binary, &[0xab; 256], None);
        assert_eq!(&bytes[..4], &[0x82, 0x7e, 0x01, 0x00]);
        assert_eq!(bytes.len(), 4 + 256);

        let bytes = encoded(true, OpCode::Binary, &[0xcd; 65536], None);
        assert_eq!(bytes[1], 0x7f);
        assert_eq!(&bytes[2..10], &65536u64.to_be_bytes());
        assert_eq!(bytes.len(), 10 + 65536);
    }

    #[test]
    fn test_appends_to_existing_buffer() {
        let mut out = BytesMut::new();
        encode_frame(&mut out, true, OpCode::Ping, b"a", None).unwrap();
        encode_frame(&mut out, true, OpCode::Pong, b"b", Some([1, 2, 3, 4])).unwrap();
        assert_eq!(
            out.to_vec(),
            vec![0x89, 0x01, b'a', 0x8a, 0x81, 1, 2, 3, 4, b'b' ^ 1]
        );
    }

    #[test]
    fn test_control_frame_rules() {
        let mut out = BytesMut::new();
        assert_eq!(
            encode_frame(&mut out, true, OpCode::Ping, &[0u8; 126], None),
            Err(Error::ControlFrameTooLarge(126))
        );
        assert_eq!(
            encode_frame(&mut out, false, OpCode::Close, &[], None),
            Err(Error::FragmentedControlFrame)
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_server_encoder_never_masks() {
        let mut encoder = FrameEncoder::new(Role::Server);
        let mut out = BytesMut::new();
        encoder.encode(&mut out, OpCode::Binary, &[1, 2, 3]).unwrap();
        assert_eq!(out.to_vec(), vec![0x82, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_client_encoder_masks_payload() {
        let mut encoder = FrameEncoder::new(Role::Client);
        let mut out = BytesMut::new();
        encoder.encode(&mut out, OpCode::Text, b"Hello").unwrap();

        assert_eq!(out[0], 0x81);
        assert_eq!(out[1], 0x85);
        let key = [out[2], out[3], out[4], out[5]];
        let mut payload = out[6..].to_vec();
        apply_mask(&mut payload, key);
        assert_eq!(payload, b"Hello");
    }

    #[test]
    fn test_mask_generator_produces_varied_keys() {
        let mut masks = MaskGenerator::new();
        let keys: Vec<[u8; 4]> = (0..8).map(|_| masks.next_key()).collect();
        assert!(keys.windows(2).any(|w| w[0] != w[1]));
    }
}
