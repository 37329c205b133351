//! # Chanmux
//!
//! A user-space transport multiplexer. Chanmux carries many independent, flow-controlled logical
//! channels over a single physical duplex message channel, using a compact framing and an
//! [SCTP](https://www.rfc-editor.org/rfc/rfc4960)-inspired credit-based backpressure scheme.
//!
//! The library is built in three layers:
//!
//! * [`Operation`](core::Operation), a single-assignment completion handle which can be awaited by
//!   blocking or observed through continuations.
//! * Queueing primitives: [`HandoffQueue`](core::queue::HandoffQueue) where producers never block,
//!   [`SerialRunner`](core::SerialRunner) which runs attempts one at a time and parks them on a
//!   [`Signal`](core::Signal) instead of a thread, and [`MultiQueue`](core::queue::MultiQueue)
//!   which keeps several FIFO queues in one global arrival order.
//! * The <sup>[`sync`]</sup> multiplexer protocol: [`Multiplexer`](sync::mux::Multiplexer)
//!   demultiplexes inbound frames by channel id, buffers them per channel, and enforces a per-channel
//!   receive window on the sending side with explicit window-update frames.
//!
//! # Usage
//!
//! ```rust
//! # #[cfg(feature = "sync")] {
//! use chanmux::prelude::*;
//!
//! let (left, right) = MemoryChannel::pair();
//! let conf = MuxConf::builder()
//!     .inbound_channels(2)
//!     .outbound_channels(2)
//!     .max_window(1024)
//!     .build();
//!
//! let alice = Multiplexer::new(left, conf.clone()).unwrap();
//! let bob = Multiplexer::new(right, conf).unwrap();
//!
//! alice.send(DataMessage::new(1, &b"hello"[..])).unwrap();
//! let message = bob.receive(1).unwrap();
//!
//! assert_eq!(message.payload().as_ref(), b"hello");
//! # }
//! ```
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod consts;
pub mod core;
pub mod errors;
pub mod prelude;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "async")]
pub mod asnc;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
