//! # Chanmux synchronous API
//!
//! Synchronous API is built around [`Multiplexer`](mux::Multiplexer). Upon construction, each
//! multiplexer takes ownership of a physical [`MessageChannel`](crate::core::io::MessageChannel)
//! and splits it into a fixed number of inbound and outbound logical channels. A single logical
//! channel can be accessed as a [`ChannelView`](mux::ChannelView).
//!
//! Available physical channels are defined in the [`io`] module:
//!
//! * [`FramedChannel`](io::FramedChannel) frames messages over any byte stream, for example a
//!   [`TcpStream`](std::net::TcpStream).
//! * [`MemoryChannel`](io::MemoryChannel) connects two channels within the same process.
//!
//! I/O is handled by dedicated threads and continuations. Blocking happens only in explicit
//! blocking conveniences such as [`Multiplexer::send`](mux::Multiplexer::send) or
//! [`Operation::wait`](crate::core::Operation::wait).

pub mod io;
pub mod mux;
