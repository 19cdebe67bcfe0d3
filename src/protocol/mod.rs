//! RFC 6455 framing: handshake keys, frame headers, masking, decoding and
//! encoding.

pub mod assembler;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::MessageAssembler;
pub use decoder::{DecodeStep, FrameDecoder, FrameSink};
pub use encoder::{FrameEncoder, MaskGenerator, encode_frame};
pub use frame::{FragmentState, FrameHeader, MAX_CONTROL_FRAME_PAYLOAD, frame_len};
pub use handshake::{
    HandshakeResponse, SWITCHING_PROTOCOLS_HEADERS, WS_GUID, compute_accept_digest,
    compute_accept_key, generate_key, verify_accept_key,
};
pub use mask::{MaskCursor, apply_mask, apply_mask_at};
pub use opcode::OpCode;
