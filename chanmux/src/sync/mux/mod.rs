//! # Multiplexer
//!
//! [`Multiplexer`] splits a physical channel into logical channels with credit-based flow control.
//! Every logical channel has a window of [`MuxConf::max_window`] bytes. The sender debits the
//! window for every message it dispatches, the receiver grants credit back with window updates
//! once messages are consumed by readers.
//!
//! Channels which are both inbound and outbound can be accessed as a [`ChannelView`].

mod conf;
mod inbound;
pub(crate) mod multiplexer;
mod outbound;
mod view;

pub use conf::{MuxConf, MuxConfBuilder};
pub use multiplexer::Multiplexer;
pub use view::ChannelView;
