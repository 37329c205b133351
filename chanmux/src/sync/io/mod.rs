//! # Synchronous physical channels

mod frame;
mod framed;
mod memory;
pub mod pipe;

pub use frame::{read_frame, write_frame, FrameHeader};
pub use framed::FramedChannel;
pub use memory::MemoryChannel;
