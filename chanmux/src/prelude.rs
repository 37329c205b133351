//! # Basic imports

pub use crate::core::io::{DataMessage, MessageChannel, PayloadChannel};
pub use crate::core::{Delivery, Operation};
pub use crate::errors::{Error, ProtocolError, Result};

#[cfg(feature = "sync")]
pub use crate::sync::io::{FramedChannel, MemoryChannel};
#[cfg(feature = "sync")]
pub use crate::sync::mux::{ChannelView, Multiplexer, MuxConf};
