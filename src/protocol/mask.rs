//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a 4-byte key applied cyclically. Because the decoder
//! sees a frame's payload in arbitrary slices, the functions here take the key
//! offset at which the slice starts and return the offset for the next one.

/// Mask (or unmask) a whole payload starting at key offset 0.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_at(data, mask, 0);
}

/// Mask `data` as if it started at byte `offset` of the frame payload.
///
/// Only `offset % 4` matters. Returns the key offset (`0..4`) for the byte
/// following `data`.
#[inline]
pub fn apply_mask_at(data: &mut [u8], mask: [u8; 4], offset: usize) -> usize {
    let start = offset % 4;
    if data.is_empty() {
        return start;
    }

    // Rotate the key so that index 0 lines up with data[0]; after that every
    // aligned 4-byte word uses the same rotated key.
    let rotated = [
        mask[start],
        mask[(start + 1) % 4],
        mask[(start + 2) % 4],
        mask[(start + 3) % 4],
    ];
    let key = u32::from_ne_bytes(rotated);

    let mut words = data.chunks_exact_mut(4);
    for word in &mut words {
        let val = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) ^ key;
        word.copy_from_slice(&val.to_ne_bytes());
    }
    for (i, byte) in words.into_remainder().iter_mut().enumerate() {
        *byte ^= rotated[i];
    }

    (start + data.len()) % 4
}

/// Resumable unmasking cursor for one frame.
///
/// Holds the mask key and the index of the key byte for the next payload
/// byte; advances only when bytes are actually unmasked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskCursor {
    key: [u8; 4],
    pos: usize,
}

impl MaskCursor {
    #[must_use]
    pub const fn new(key: [u8; 4]) -> Self {
        Self { key, pos: 0 }
    }

    /// Unmask the next run of payload bytes in place.
    #[inline]
    pub fn apply(&mut self, data: &mut [u8]) {
        self.pos = apply_mask_at(data, self.key, self.pos);
    }

    /// Current key index, always in `0..4`.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn key(&self) -> [u8; 4] {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_bytewise(data: &mut [u8], mask: [u8; 4]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_empty_keeps_offset() {
        let mut data: Vec<u8> = vec![];
        assert_eq!(apply_mask_at(&mut data, [1, 2, 3, 4], 3), 3);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_matches_bytewise_for_many_sizes() {
        let mask = [0xab, 0xcd, 0xef, 0x12];
        for size in [0, 1, 2, 3, 4, 5, 7, 8, 15, 16, 17, 31, 32, 33, 100, 127, 128, 1000] {
            let original: Vec<u8> = (0..size).map(|i| (i & 0xff) as u8).collect();
            let mut expected = original.clone();
            let mut actual = original.clone();

            mask_bytewise(&mut expected, mask);
            apply_mask(&mut actual, mask);

            assert_eq!(expected, actual, "mismatch at size {}", size);
        }
    }

    #[test]
    fn test_split_runs_match_single_pass() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let original: Vec<u8> = (0..37u8).collect();
        let mut whole = original.clone();
        apply_mask(&mut whole, mask);

        for split in [1, 2, 3, 5, 9, 36] {
            let mut pieces = original.clone();
            let (a, b) = pieces.split_at_mut(split);
            let next = apply_mask_at(a, mask, 0);
            assert_eq!(next, split % 4);
            apply_mask_at(b, mask, next);
            assert_eq!(pieces, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_cursor_advances_modulo_four() {
        let mut cursor = MaskCursor::new([0xff, 0x00, 0x00, 0x00]);
        assert_eq!(cursor.position(), 0);

        let mut first = vec![0xaa; 3];
        cursor.apply(&mut first);
        assert_eq!(first, vec![0x55, 0xaa, 0xaa]);
        assert_eq!(cursor.position(), 3);

        let mut second = vec![0xaa; 2];
        cursor.apply(&mut second);
        // byte 3 uses key[3], byte 4 wraps to key[0]
        assert_eq!(second, vec![0xaa, 0x55]);
        assert_eq!(cursor.position(), 1);
    }
}
