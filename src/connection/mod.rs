//! Per-link protocol state.
//!
//! A [`Connection`] owns the inbound decoder, the close handshake state and
//! the outbound byte queue. It performs no I/O:
//!
//! ```text
//! transport bytes --process--> decoder --> FrameHandler
//!                                  \--> ping/close replies --\
//! send_*/ping/close ---------------------------------------> outbound --take_outbound--> transport
//! ```
//!
//! ## Close lifecycle
//!
//! 1. **Open**: after the upgrade handshake
//! 2. **Closing**: we queued a close frame and wait for the peer's
//! 3. **Closed**: the peer's close frame arrived (echoed if we had not sent one)

#[allow(clippy::module_inception)]
mod connection;
mod fragmenter;
mod handler;
mod role;
mod state;

pub use connection::Connection;
pub use fragmenter::{Fragment, MessageFragmenter};
pub use handler::FrameHandler;
pub use role::Role;
pub use state::ConnectionState;
