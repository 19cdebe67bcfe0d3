use std::ops::ControlFlow;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::config::Config;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::{ConnectionState, FrameHandler, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::decoder::{FrameDecoder, FrameSink};
use crate::protocol::{FragmentState, FrameEncoder, FrameHeader, OpCode};

/// One established WebSocket link, without any I/O.
///
/// The transport feeds received bytes to [`process`](Self::process) and
/// writes whatever [`take_outbound`](Self::take_outbound) returns. Replies the
/// protocol requires (pong for ping, close echo) are queued automatically.
///
/// ## Example
///
/// ```rust
/// use wscore::{Config, Connection, FragmentState, FrameHandler, Role};
///
/// struct Print;
///
/// impl FrameHandler for Print {
///     fn on_frame(&mut self, payload: &[u8], _binary: bool, _state: FragmentState) {
///         println!("{}", String::from_utf8_lossy(payload));
///     }
/// }
///
/// let mut client = Connection::new(Role::Client, Config::default());
/// let mut server = Connection::new(Role::Server, Config::default());
///
/// client.send_text("hello").unwrap();
/// let wire = client.take_outbound().unwrap();
/// server.process(&wire, &mut Print).unwrap();
/// ```
#[derive(Debug)]
pub struct Connection {
    config: Config,
    decoder: FrameDecoder,
    control: ControlState,
}

/// Everything the inbound control-frame path needs to write, kept apart from
/// the decoder so both can be borrowed at once.
#[derive(Debug)]
struct ControlState {
    encoder: FrameEncoder,
    outbound: BytesMut,
    state: ConnectionState,
    close_sent: bool,
    /// Opcode of an outgoing fragmented message still waiting for its FIN.
    sending: Option<OpCode>,
}

impl ControlState {
    fn queue_close(&mut self, payload: &[u8]) -> Result<()> {
        self.encoder.encode(&mut self.outbound, OpCode::Close, payload)?;
        self.close_sent = true;
        Ok(())
    }
}

/// Routes decoder output to the control logic and the application handler.
struct Dispatch<'a, H> {
    control: &'a mut ControlState,
    handler: &'a mut H,
}

impl<H: FrameHandler> FrameSink for Dispatch<'_, H> {
    fn data(&mut self, payload: &[u8], binary: bool, state: FragmentState) {
        self.handler.on_frame(payload, binary, state);
    }

    fn data_header(&mut self, header: &FrameHeader) {
        self.handler.on_frame_header(header);
    }

    fn control(&mut self, opcode: OpCode, payload: &[u8]) -> Result<ControlFlow<()>> {
        match opcode {
            OpCode::Ping => {
                trace!(len = payload.len(), "ping received");
                if self.control.state != ConnectionState::Closed {
                    self.control
                        .encoder
                        .encode(&mut self.control.outbound, OpCode::Pong, payload)?;
                }
                self.handler.on_ping(payload);
                Ok(ControlFlow::Continue(()))
            }
            OpCode::Pong => {
                trace!(len = payload.len(), "pong received");
                self.handler.on_pong(payload);
                Ok(ControlFlow::Continue(()))
            }
            OpCode::Close => {
                let frame = CloseFrame::parse(payload)?;
                let code = frame.as_ref().map(|f| f.code.as_u16());
                debug!(?code, echo = !self.control.close_sent, "close received");

                if !self.control.close_sent {
                    let echo = code.map(u16::to_be_bytes);
                    self.control
                        .queue_close(echo.as_ref().map_or(&[][..], |c| &c[..]))?;
                }
                self.control.state = ConnectionState::Closed;
                self.handler.on_close(frame.as_ref());
                Ok(ControlFlow::Break(()))
            }
            other => Err(Error::ProtocolViolation(format!(
                "{other} is not a control opcode"
            ))),
        }
    }
}

impl Connection {
    #[must_use]
    pub fn new(role: Role, config: Config) -> Self {
        Self {
            decoder: FrameDecoder::new(role, &config),
            control: ControlState {
                encoder: FrameEncoder::new(role),
                outbound: BytesMut::new(),
                state: ConnectionState::Open,
                close_sent: false,
                sending: None,
            },
            config,
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.control.encoder.role()
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.control.state
    }

    /// A close frame has been queued, either by us or as an echo.
    #[must_use]
    pub const fn is_close_sent(&self) -> bool {
        self.control.close_sent
    }

    /// The protocol violation that stopped decoding, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.decoder.error()
    }

    /// Close status for the recorded violation, or 0 while healthy.
    #[must_use]
    pub fn error_code(&self) -> u16 {
        self.error().map_or(0, Error::close_code)
    }

    /// Opcode of the inbound fragmented message in progress.
    #[must_use]
    pub const fn last_opcode(&self) -> Option<OpCode> {
        self.decoder.last_opcode()
    }

    /// Inbound decoder, for inspecting its position.
    #[must_use]
    pub const fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Decode `input` and dispatch every completed frame to `handler`.
    ///
    /// Returns the number of bytes consumed. After the peer's close frame has
    /// been processed the rest of the input is ignored, and every later call
    /// consumes nothing.
    ///
    /// # Errors
    ///
    /// Returns the protocol violation that stopped decoding. It is recorded:
    /// later calls return it again, and [`error_code`](Self::error_code)
    /// reports its close status.
    pub fn process<H: FrameHandler>(&mut self, input: &[u8], handler: &mut H) -> Result<usize> {
        if self.decoder.error().is_none() && !self.control.state.can_receive() {
            return Ok(0);
        }
        let mut sink = Dispatch {
            control: &mut self.control,
            handler,
        };
        self.decoder.decode(input, &mut sink)
    }

    /// Drain everything queued for the transport.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if self.control.outbound.is_empty() {
            None
        } else {
            Some(self.control.outbound.split().freeze())
        }
    }

    #[must_use]
    pub fn has_outbound(&self) -> bool {
        !self.control.outbound.is_empty()
    }

    fn ensure_can_send_data(&self) -> Result<()> {
        if let Some(err) = self.decoder.error() {
            return Err(err.clone());
        }
        if self.control.close_sent {
            return Err(Error::ConnectionClosed(None));
        }
        Ok(())
    }

    /// Queue a text message, split into frames of at most
    /// `Config::fragment_size` bytes.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` after a close frame was sent
    /// - the recorded decode error, if any
    /// - `Error::MessageTooLarge` above `Limits::max_message_size`
    /// - `Error::ProtocolViolation` while a fragmented message is being sent
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_message(OpCode::Text, text.as_bytes())
    }

    /// Queue a binary message. Fragmentation and errors as for
    /// [`send_text`](Self::send_text).
    ///
    /// # Errors
    ///
    /// See [`send_text`](Self::send_text).
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_message(OpCode::Binary, data)
    }

    fn send_message(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.ensure_can_send_data()?;
        if self.control.sending.is_some() {
            return Err(Error::ProtocolViolation(
                "Fragmented message in progress".into(),
            ));
        }
        self.config.limits.check_message_size(payload.len())?;

        let control = &mut self.control;
        for frag in MessageFragmenter::new(payload, opcode, self.config.fragment_size) {
            control
                .encoder
                .encode_fragment(&mut control.outbound, frag.opcode, frag.payload, frag.fin)?;
        }
        Ok(())
    }

    /// Queue one data frame with an explicit FIN bit.
    ///
    /// A fragmented message starts with `Text` or `Binary` and `fin = false`,
    /// continues with `Continuation` frames and ends with one that has
    /// `fin = true`. Control frames can be interleaved.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` after a close frame was sent
    /// - the recorded decode error, if any
    /// - `Error::ProtocolViolation` for a control opcode or out-of-sequence
    ///   continuation
    pub fn send_fragment(&mut self, payload: &[u8], opcode: OpCode, fin: bool) -> Result<()> {
        self.ensure_can_send_data()?;
        let sending = match (opcode, self.control.sending) {
            (OpCode::Continuation, Some(first)) => first,
            (OpCode::Text | OpCode::Binary, None) => opcode,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "No fragmented message to continue".into(),
                ));
            }
            (OpCode::Text | OpCode::Binary, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "Fragmented message in progress".into(),
                ));
            }
            (other, _) => {
                return Err(Error::ProtocolViolation(format!(
                    "{other} cannot be sent as a fragment"
                )));
            }
        };

        let control = &mut self.control;
        control
            .encoder
            .encode_fragment(&mut control.outbound, opcode, payload, fin)?;
        control.sending = (!fin).then_some(sending);
        Ok(())
    }

    fn ensure_can_send_control(&self) -> Result<()> {
        if let Some(err) = self.decoder.error() {
            return Err(err.clone());
        }
        if self.control.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed(None));
        }
        Ok(())
    }

    /// Queue a ping.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` above 125 bytes
    /// - `Error::ConnectionClosed` once the peer's close was received
    pub fn ping(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_can_send_control()?;
        let control = &mut self.control;
        control.encoder.encode(&mut control.outbound, OpCode::Ping, payload)?;
        trace!(len = payload.len(), "ping queued");
        Ok(())
    }

    /// Queue an unsolicited pong.
    ///
    /// # Errors
    ///
    /// As for [`ping`](Self::ping).
    pub fn pong(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_can_send_control()?;
        let control = &mut self.control;
        control.encoder.encode(&mut control.outbound, OpCode::Pong, payload)?;
        trace!(len = payload.len(), "pong queued");
        Ok(())
    }

    /// Queue a close frame with status 1000 and no reason.
    ///
    /// # Errors
    ///
    /// `Error::CloseAlreadySent` if a close frame was already queued.
    pub fn close(&mut self) -> Result<()> {
        self.close_with(CloseCode::Normal, "")
    }

    /// Queue a close frame with the given status and reason.
    ///
    /// Allowed after a decode error, so the caller can report
    /// [`error_code`](Self::error_code) to the peer.
    ///
    /// # Errors
    ///
    /// - `Error::CloseAlreadySent` if a close frame was already queued
    /// - `Error::InvalidCloseCode` for codes that must not be sent
    /// - `Error::ControlFrameTooLarge` if the reason exceeds 123 bytes
    pub fn close_with(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.control.close_sent {
            return Err(Error::CloseAlreadySent);
        }
        let payload = CloseFrame::new(code, reason).to_payload()?;
        self.control.queue_close(&payload)?;
        if self.control.state == ConnectionState::Open {
            self.control.state = ConnectionState::Closing;
        }
        debug!(role = %self.role(), code = code.as_u16(), "close sent");
        Ok(())
    }
}
