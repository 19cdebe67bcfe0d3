//! Splitting outgoing messages into frames.

use crate::protocol::OpCode;

/// One outgoing frame, borrowing its payload from the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: &'a [u8],
}

/// Iterator over the frames of one message.
///
/// The first frame carries the message opcode, later frames are
/// continuations, and only the last has FIN set. An empty payload yields a
/// single empty final frame.
#[derive(Debug, Clone)]
pub struct MessageFragmenter<'a> {
    rest: &'a [u8],
    opcode: OpCode,
    fragment_size: usize,
    first: bool,
    done: bool,
}

impl<'a> MessageFragmenter<'a> {
    /// `fragment_size` is clamped to at least one byte.
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            rest: payload,
            opcode,
            fragment_size: fragment_size.max(1),
            first: true,
            done: false,
        }
    }

    /// Payload bytes not yet handed out.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl<'a> Iterator for MessageFragmenter<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        if self.done {
            return None;
        }
        let take = self.rest.len().min(self.fragment_size);
        let (payload, rest) = self.rest.split_at(take);
        self.rest = rest;

        let opcode = if self.first {
            self.opcode
        } else {
            OpCode::Continuation
        };
        self.first = false;
        self.done = rest.is_empty();

        Some(Fragment {
            fin: self.done,
            opcode,
            payload,
        })
    }
}
