//! Queue-style consumer that turns deliveries back into whole messages.

use std::collections::VecDeque;

use bytes::BytesMut;
use tracing::debug;

use crate::config::Limits;
use crate::connection::FrameHandler;
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::{FragmentState, FrameHeader};

/// Reassembles fragmented messages and queues them with control frames.
///
/// Pass it to [`Connection::process`](crate::Connection::process) in place
/// of a custom handler, then drain it with [`pop`](Self::pop). Frames are
/// counted toward `Limits::max_fragment_count` from their headers, so the
/// count is the same in both delivery modes however the input was split.
///
/// A message that breaks a limit or is not valid UTF-8 is discarded and the
/// error is kept until [`pop`](Self::pop) or [`take_error`](Self::take_error)
/// returns it. Later messages are assembled normally.
#[derive(Debug)]
pub struct MessageAssembler {
    limits: Limits,
    buffer: BytesMut,
    /// Kind of the message in progress, `Some(binary)`.
    current: Option<bool>,
    fragment_count: usize,
    /// Skipping the rest of a rejected message.
    discarding: bool,
    queue: VecDeque<Message>,
    error: Option<Error>,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            buffer: BytesMut::new(),
            current: None,
            fragment_count: 0,
            discarding: false,
            queue: VecDeque::new(),
            error: None,
        }
    }

    /// Next complete message.
    ///
    /// # Errors
    ///
    /// A pending assembly error is returned, once, before any queued message.
    pub fn pop(&mut self) -> Result<Option<Message>> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(self.queue.pop_front())
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Messages ready to pop.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// A fragmented message is partially received.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.current.is_some()
    }

    /// Bounds for the frame about to be appended.
    fn admit(&mut self, header: &FrameHeader) -> Result<()> {
        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;
        let len = usize::try_from(header.payload_len).unwrap_or(usize::MAX);
        self.limits
            .check_message_size(self.buffer.len().saturating_add(len))
    }

    fn append(&mut self, payload: &[u8]) -> Result<()> {
        self.limits
            .check_message_size(self.buffer.len().saturating_add(payload.len()))?;
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    fn complete(&mut self, binary: bool) -> Result<Message> {
        let payload = self.buffer.split().to_vec();
        if binary {
            Ok(Message::Binary(payload))
        } else {
            String::from_utf8(payload)
                .map(Message::Text)
                .map_err(|_| Error::InvalidUtf8)
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.current = None;
        self.fragment_count = 0;
    }

    fn reject(&mut self, err: Error, state: FragmentState) {
        debug!(error = %err, "message discarded");
        self.reset();
        self.discarding = !state.is_final();
        self.error.get_or_insert(err);
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl FrameHandler for MessageAssembler {
    fn on_frame_header(&mut self, header: &FrameHeader) {
        if self.discarding {
            return;
        }
        if let Err(err) = self.admit(header) {
            debug!(error = %err, "message discarded");
            self.reset();
            // The frame's own deliveries end the discard.
            self.discarding = true;
            self.error.get_or_insert(err);
        }
    }

    fn on_frame(&mut self, payload: &[u8], binary: bool, state: FragmentState) {
        if self.discarding {
            self.discarding = !state.is_final();
            return;
        }
        let binary = *self.current.get_or_insert(binary);

        if let Err(err) = self.append(payload) {
            self.reject(err, state);
            return;
        }
        if state.is_final() {
            let result = self.complete(binary);
            self.reset();
            match result {
                Ok(message) => self.queue.push_back(message),
                Err(err) => self.reject(err, state),
            }
        }
    }

    fn on_ping(&mut self, payload: &[u8]) {
        self.queue.push_back(Message::Ping(payload.to_vec()));
    }

    fn on_pong(&mut self, payload: &[u8]) {
        self.queue.push_back(Message::Pong(payload.to_vec()));
    }

    fn on_close(&mut self, frame: Option<&CloseFrame>) {
        self.queue.push_back(Message::Close(frame.cloned()));
    }
}
