//! # wscore - sans-I/O WebSocket protocol engine
//!
//! `wscore` implements RFC 6455 framing over any byte stream without doing
//! any I/O itself. The transport hands received bytes to a [`Connection`] and
//! writes out whatever the connection queues.
//!
//! ## Features
//!
//! - **Incremental decoding**: input may be split anywhere, down to single bytes
//! - **Role-aware masking**: clients mask with a fresh key per frame, servers
//!   reject unmasked input
//! - **Close handshake** with automatic echo and pong replies
//! - **Bounded resources** through [`Limits`]
//! - **Handshake keys**: `Sec-WebSocket-Accept` derivation and the `101` response
//!
//! ## Quick Start
//!
//! ```rust
//! use wscore::{Config, Connection, Message, MessageAssembler, Role};
//!
//! let mut client = Connection::new(Role::Client, Config::default());
//! let mut server = Connection::new(Role::Server, Config::default());
//! let mut inbox = MessageAssembler::default();
//!
//! client.send_text("hello").unwrap();
//! let wire = client.take_outbound().unwrap();
//! server.process(&wire, &mut inbox).unwrap();
//!
//! assert_eq!(inbox.pop().unwrap(), Some(Message::Text("hello".into())));
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

pub use config::{Config, DeliveryMode, Limits};
pub use connection::{Connection, ConnectionState, FrameHandler, Role};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    FragmentState, HandshakeResponse, MessageAssembler, OpCode, WS_GUID, compute_accept_key,
};
