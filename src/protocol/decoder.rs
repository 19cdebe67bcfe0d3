//! Incremental frame decoder.
//!
//! [`FrameDecoder::decode`] accepts input of any length, including a single
//! byte, and resumes exactly where the previous call stopped. Per frame the
//! decoder walks
//!
//! ```text
//! Start -> Length -> [ShortLength | ExtendedLength] -> [Key] -> Data -> End
//! ```
//!
//! and returns to `Start` once the frame has been delivered. Nothing from the
//! input is retained between calls except the header accumulator and, in
//! buffered delivery mode, the payload of the current frame.

use std::ops::ControlFlow;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::config::{Config, DeliveryMode, Limits};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::frame::{
    FIN_BIT, FragmentState, FrameHeader, LEN_16_MARKER, LEN_64_MARKER, MASK_BIT,
    MAX_INLINE_LEN, RSV1_BIT, RSV2_BIT, RSV3_BIT,
};
use crate::protocol::mask::MaskCursor;

/// Reservation cap for the frame buffer; larger frames grow as bytes arrive.
const INITIAL_BUFFER_CAP: u64 = 64 * 1024;

/// Position of the decoder within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStep {
    /// Waiting for the FIN/RSV/opcode byte.
    Start,
    /// Waiting for the MASK/length byte.
    Length,
    /// Reading a 16-bit extended length.
    ShortLength,
    /// Reading a 64-bit extended length.
    ExtendedLength,
    /// Reading the 4-byte masking key.
    Key,
    /// Consuming payload bytes.
    Data,
    /// Frame complete, about to be dispatched.
    End,
}

/// Receiver of decoded frames.
pub trait FrameSink {
    /// Data-frame payload (Text, Binary or Continuation).
    ///
    /// `binary` is resolved from the first frame of the message for
    /// continuations.
    fn data(&mut self, payload: &[u8], binary: bool, state: FragmentState);

    /// Header of a data frame, complete before any of its payload is
    /// delivered. Called once per frame whatever the delivery mode.
    fn data_header(&mut self, _header: &FrameHeader) {}

    /// A complete control frame. Returning `Break` stops decoding after this
    /// frame; remaining input is left unconsumed.
    ///
    /// # Errors
    ///
    /// An error is recorded on the decoder like any protocol violation.
    fn control(&mut self, opcode: OpCode, payload: &[u8]) -> Result<ControlFlow<()>>;
}

/// Header bytes collected so far for the current frame.
#[derive(Debug, Clone, Copy, Default)]
struct PendingHeader {
    second: u8,
    ext_len: [u8; 8],
    key: [u8; 4],
    /// Bytes collected for the multi-byte field being read.
    filled: usize,
}

impl PendingHeader {
    /// Copy bytes into `field[filled..]`; returns how many input bytes were used
    /// and whether the field is complete.
    fn fill(field: &mut [u8], filled: &mut usize, input: &[u8]) -> (usize, bool) {
        let want = field.len() - *filled;
        let take = want.min(input.len());
        field[*filled..*filled + take].copy_from_slice(&input[..take]);
        *filled += take;
        (take, *filled == field.len())
    }
}

/// Per-connection incremental decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    role: Role,
    limits: Limits,
    delivery: DeliveryMode,
    accept_unmasked: bool,

    step: DecodeStep,
    pending: PendingHeader,
    header: FrameHeader,
    remaining: u64,
    mask: Option<MaskCursor>,
    /// `FrameSink::data_header` was called for the current frame.
    header_announced: bool,

    /// Opcode of the first frame of the fragmented message in progress.
    last_opcode: Option<OpCode>,
    /// Whether the current data frame belongs to a binary message.
    binary: bool,
    /// Streaming mode: something of the current message was delivered.
    message_started: bool,

    buffer: BytesMut,
    scratch: Vec<u8>,
    error: Option<Error>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(role: Role, config: &Config) -> Self {
        Self {
            role,
            limits: config.limits.clone(),
            delivery: config.delivery,
            accept_unmasked: config.accept_unmasked_frames,
            step: DecodeStep::Start,
            pending: PendingHeader::default(),
            header: FrameHeader::new(true, OpCode::Continuation, 0),
            remaining: 0,
            mask: None,
            header_announced: false,
            last_opcode: None,
            binary: false,
            message_started: false,
            buffer: BytesMut::new(),
            scratch: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub const fn step(&self) -> DecodeStep {
        self.step
    }

    /// Payload bytes of the current frame not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub const fn last_opcode(&self) -> Option<OpCode> {
        self.last_opcode
    }

    /// Current masking key index, `None` for unmasked frames.
    #[must_use]
    pub fn mask_position(&self) -> Option<usize> {
        self.mask.as_ref().map(MaskCursor::position)
    }

    /// The recorded violation, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Feed `input` and dispatch every frame it completes.
    ///
    /// Returns the number of bytes consumed. This is `input.len()` unless the
    /// sink stopped decoding after a control frame.
    ///
    /// # Errors
    ///
    /// Returns the protocol violation that stopped decoding. The error is
    /// sticky: every later call returns it again without consuming input.
    pub fn decode<S: FrameSink>(&mut self, input: &[u8], sink: &mut S) -> Result<usize> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.run(input, sink) {
            Ok(consumed) => Ok(consumed),
            Err(err) => {
                debug!(role = %self.role, step = ?self.step, error = %err, "frame decode failed");
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn run<S: FrameSink>(&mut self, input: &[u8], sink: &mut S) -> Result<usize> {
        let mut pos = 0;
        loop {
            match self.step {
                DecodeStep::Start => {
                    let Some(&byte) = input.get(pos) else { break };
                    pos += 1;
                    self.begin_frame(byte)?;
                }
                DecodeStep::Length => {
                    let Some(&byte) = input.get(pos) else { break };
                    pos += 1;
                    self.read_length_byte(byte)?;
                }
                DecodeStep::ShortLength => {
                    if pos == input.len() {
                        break;
                    }
                    let (used, done) = PendingHeader::fill(
                        &mut self.pending.ext_len[..2],
                        &mut self.pending.filled,
                        &input[pos..],
                    );
                    pos += used;
                    if done {
                        let len = u16::from_be_bytes([self.pending.ext_len[0], self.pending.ext_len[1]]);
                        if u64::from(len) <= MAX_INLINE_LEN {
                            return Err(Error::NonMinimalLength {
                                len: u64::from(len),
                                width: 16,
                            });
                        }
                        self.length_known(u64::from(len))?;
                    }
                }
                DecodeStep::ExtendedLength => {
                    if pos == input.len() {
                        break;
                    }
                    let (used, done) = PendingHeader::fill(
                        &mut self.pending.ext_len,
                        &mut self.pending.filled,
                        &input[pos..],
                    );
                    pos += used;
                    if done {
                        let len = u64::from_be_bytes(self.pending.ext_len);
                        if len >> 63 != 0 {
                            return Err(Error::ProtocolViolation(
                                "64-bit payload length has the most significant bit set".into(),
                            ));
                        }
                        if len <= u64::from(u16::MAX) {
                            return Err(Error::NonMinimalLength { len, width: 64 });
                        }
                        self.length_known(len)?;
                    }
                }
                DecodeStep::Key => {
                    if pos == input.len() {
                        break;
                    }
                    let (used, done) = PendingHeader::fill(
                        &mut self.pending.key,
                        &mut self.pending.filled,
                        &input[pos..],
                    );
                    pos += used;
                    if done {
                        self.header.mask = Some(self.pending.key);
                        self.mask = Some(MaskCursor::new(self.pending.key));
                        self.step = DecodeStep::Data;
                    }
                }
                DecodeStep::Data => {
                    if !self.header_announced {
                        self.header_announced = true;
                        if self.header.opcode.is_data() {
                            sink.data_header(&self.header);
                        }
                    }
                    if self.remaining == 0 {
                        self.step = DecodeStep::End;
                        continue;
                    }
                    if pos == input.len() {
                        break;
                    }
                    let available = (input.len() - pos) as u64;
                    let take = self.remaining.min(available) as usize;
                    self.consume_payload(&input[pos..pos + take], sink);
                    pos += take;
                }
                DecodeStep::End => {
                    let flow = self.finish_frame(sink)?;
                    self.step = DecodeStep::Start;
                    if flow.is_break() {
                        return Ok(pos);
                    }
                }
            }
        }
        Ok(pos)
    }

    /// `Start`: FIN, RSV bits and opcode.
    fn begin_frame(&mut self, byte: u8) -> Result<()> {
        let opcode = OpCode::from_u8(byte)?;
        let mut header = FrameHeader::new(byte & FIN_BIT != 0, opcode, 0);
        header.rsv1 = byte & RSV1_BIT != 0;
        header.rsv2 = byte & RSV2_BIT != 0;
        header.rsv3 = byte & RSV3_BIT != 0;
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if opcode.is_control() && !header.fin {
            return Err(Error::FragmentedControlFrame);
        }

        match opcode {
            OpCode::Continuation => {
                let Some(first) = self.last_opcode else {
                    return Err(Error::ProtocolViolation(
                        "Unexpected continuation frame".into(),
                    ));
                };
                self.binary = first == OpCode::Binary;
                if header.fin {
                    self.last_opcode = None;
                }
            }
            OpCode::Text | OpCode::Binary => {
                if self.last_opcode.is_some() {
                    return Err(Error::ProtocolViolation(
                        "Expected continuation frame".into(),
                    ));
                }
                self.binary = opcode == OpCode::Binary;
                if !header.fin {
                    self.last_opcode = Some(opcode);
                }
            }
            OpCode::Close | OpCode::Ping | OpCode::Pong => {}
        }

        self.pending = PendingHeader::default();
        self.header = header;
        self.header_announced = false;
        self.mask = None;
        self.step = DecodeStep::Length;
        Ok(())
    }

    /// `Length`: MASK bit and 7-bit length.
    fn read_length_byte(&mut self, byte: u8) -> Result<()> {
        self.pending.second = byte;
        let masked = byte & MASK_BIT != 0;
        if masked != self.role.expects_masked() {
            if masked {
                return Err(Error::MaskedServerFrame);
            }
            if !self.accept_unmasked {
                return Err(Error::UnmaskedClientFrame);
            }
        }

        match byte & !MASK_BIT {
            LEN_16_MARKER => self.step = DecodeStep::ShortLength,
            LEN_64_MARKER => self.step = DecodeStep::ExtendedLength,
            len => self.length_known(u64::from(len))?,
        }
        Ok(())
    }

    /// Final payload length known: validate it and move to `Key` or `Data`.
    fn length_known(&mut self, len: u64) -> Result<()> {
        self.header.payload_len = len;
        if self.header.opcode.is_control() {
            self.header.validate()?;
        } else {
            self.limits.check_frame_size(len)?;
        }

        self.remaining = len;
        self.pending.filled = 0;
        if self.buffers_payload() {
            self.buffer.clear();
            self.buffer.reserve(len.min(INITIAL_BUFFER_CAP) as usize);
        }
        self.step = if self.pending.second & MASK_BIT != 0 {
            DecodeStep::Key
        } else {
            DecodeStep::Data
        };
        Ok(())
    }

    fn buffers_payload(&self) -> bool {
        self.header.opcode.is_control() || self.delivery == DeliveryMode::Buffered
    }

    /// `Data`: unmask and either buffer or stream out one run of payload.
    fn consume_payload<S: FrameSink>(&mut self, run: &[u8], sink: &mut S) {
        self.remaining -= run.len() as u64;
        if self.remaining == 0 {
            self.step = DecodeStep::End;
        }

        if self.buffers_payload() {
            let start = self.buffer.len();
            self.buffer.extend_from_slice(run);
            if let Some(mask) = &mut self.mask {
                mask.apply(&mut self.buffer[start..]);
            }
            return;
        }

        let state = self.streaming_state(self.remaining == 0);
        if let Some(mask) = &mut self.mask {
            self.scratch.clear();
            self.scratch.extend_from_slice(run);
            mask.apply(&mut self.scratch);
            sink.data(&self.scratch, self.binary, state);
        } else {
            sink.data(run, self.binary, state);
        }
    }

    fn streaming_state(&mut self, frame_complete: bool) -> FragmentState {
        if frame_complete && self.header.fin {
            self.message_started = false;
            FragmentState::Finish
        } else if self.message_started {
            FragmentState::Continue
        } else {
            self.message_started = true;
            FragmentState::Start
        }
    }

    /// `End`: dispatch the completed frame.
    fn finish_frame<S: FrameSink>(&mut self, sink: &mut S) -> Result<ControlFlow<()>> {
        let opcode = self.header.opcode;
        trace!(%opcode, fin = self.header.fin, len = self.header.payload_len, "frame decoded");

        if opcode.is_control() {
            let flow = sink.control(opcode, &self.buffer)?;
            self.buffer.clear();
            return Ok(flow);
        }

        match self.delivery {
            DeliveryMode::Buffered => {
                let state = FragmentState::of_frame(self.header.fin, opcode);
                sink.data(&self.buffer, self.binary, state);
                self.buffer.clear();
            }
            DeliveryMode::Streaming => {
                // Runs were delivered from `Data`; an empty frame still gets one delivery.
                if self.header.payload_len == 0 {
                    let state = self.streaming_state(true);
                    sink.data(&[], self.binary, state);
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
