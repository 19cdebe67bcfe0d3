//! Connection configuration: resource limits, delivery mode and outbound
//! fragmentation.

use crate::error::{Error, Result};

const MIB: usize = 1024 * 1024;

/// Bounds on what a peer can make one connection hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted frame payload, in bytes.
    ///
    /// Checked as soon as the length field is decoded, before any payload
    /// byte is read. With buffered delivery it also caps the frame buffer.
    /// Default 16 MiB.
    pub max_frame_size: u64,

    /// Largest message, in bytes. Applies to `Connection::send_text` and
    /// `send_binary`, and to reassembly in
    /// [`MessageAssembler`](crate::protocol::MessageAssembler). Default 64 MiB.
    pub max_message_size: usize,

    /// Most frames a reassembled message may consist of. Default 128.
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::new(16 * MIB as u64, 64 * MIB, 128)
    }
}

impl Limits {
    #[must_use]
    pub const fn new(max_frame_size: u64, max_message_size: usize, max_fragment_count: usize) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
        }
    }

    /// Tight bounds for memory-constrained targets: 64 KiB frames, 256 KiB
    /// messages, 16 fragments.
    #[must_use]
    pub const fn embedded() -> Self {
        Self::new(64 * 1024, 256 * 1024, 16)
    }

    /// No bounds at all. Only sensible for trusted peers.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self::new(u64::MAX, usize::MAX, usize::MAX)
    }

    /// # Errors
    ///
    /// `Error::FrameTooLarge` if `size` is above `max_frame_size`.
    pub const fn check_frame_size(&self, size: u64) -> Result<()> {
        if size > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `Error::MessageTooLarge` if `size` is above `max_message_size`.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            return Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `Error::TooManyFragments` if `count` is above `max_fragment_count`.
    pub const fn check_fragment_count(&self, count: usize) -> Result<()> {
        if count > self.max_fragment_count {
            return Err(Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            });
        }
        Ok(())
    }
}

/// How the decoder hands data-frame payloads to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMode {
    /// Accumulate each frame and deliver it once, when the frame ends.
    ///
    /// Deliveries are identical however the input was chunked.
    #[default]
    Buffered,
    /// Deliver payload bytes as soon as they arrive, without frame buffering.
    Streaming,
}

/// Settings fixed for the lifetime of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub limits: Limits,

    /// Default [`DeliveryMode::Buffered`].
    pub delivery: DeliveryMode,

    /// Let a server accept unmasked client frames. RFC 6455 forbids them;
    /// this exists for test peers. Default false.
    pub accept_unmasked_frames: bool,

    /// Largest frame payload produced by `send_text`/`send_binary`; longer
    /// messages go out as continuation frames. Default 16 KiB.
    pub fragment_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            delivery: DeliveryMode::Buffered,
            accept_unmasked_frames: false,
            fragment_size: 16 * 1024,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Shorthand for changing only `limits.max_frame_size`.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: u64) -> Self {
        self.limits.max_frame_size = size;
        self
    }

    #[must_use]
    pub const fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    #[must_use]
    pub const fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }
}
