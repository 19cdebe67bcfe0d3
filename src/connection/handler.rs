//! Application callback for decoded frames.

use crate::message::CloseFrame;
use crate::protocol::{FragmentState, FrameHeader};

/// Receives what [`Connection::process`](super::Connection::process) decodes.
///
/// Payload slices borrow connection memory and are valid only for the
/// duration of the call; copy them to keep them.
pub trait FrameHandler {
    /// Data delivery. `binary` is false for text messages, including their
    /// continuation frames.
    fn on_frame(&mut self, payload: &[u8], binary: bool, state: FragmentState);

    /// A data frame's header has been decoded; its payload follows through
    /// [`on_frame`](Self::on_frame). Called exactly once per frame, so it
    /// counts frames even when streaming delivery splits one into many runs.
    fn on_frame_header(&mut self, _header: &FrameHeader) {}

    /// Ping received. The pong reply has already been queued.
    fn on_ping(&mut self, _payload: &[u8]) {}

    fn on_pong(&mut self, _payload: &[u8]) {}

    /// Close frame received; `None` when it carried no status code.
    fn on_close(&mut self, _frame: Option<&CloseFrame>) {}
}
