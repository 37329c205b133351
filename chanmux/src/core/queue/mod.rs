//! # Queues
//!
//! * [`HandoffQueue`] hands values over to waiting consumers; producers never block.
//! * [`MultiQueue`] keeps several FIFO queues in one global arrival order.

mod handoff;
mod multi;

pub use handoff::HandoffQueue;
pub use multi::{EntryKey, MultiQueue};
