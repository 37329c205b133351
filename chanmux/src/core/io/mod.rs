//! # Core I/O abstractions
//!
//! Contracts shared by all channel implementations:
//!
//! * [`MessageChannel`] is a physical duplex channel of channel-tagged messages. The
//!   [`Multiplexer`](crate::sync::mux::Multiplexer) runs on top of it.
//! * [`PayloadChannel`] is a logical channel of raw payloads. It is implemented by
//!   [`ChannelView`](crate::sync::mux::ChannelView).
//! * [`WindowUpdate`] is the payload of flow control frames.
//!
//! Channel implementations live in [`sync::io`](crate::sync::io) and are marked with
//! <sup>[`sync`](crate::sync)</sup>.

mod channel;
mod message;
mod window;

pub use channel::{MessageChannel, PayloadChannel};
pub use message::DataMessage;
pub use window::WindowUpdate;
