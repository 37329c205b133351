//! # Core primitives
//!
//! Runtime-agnostic building blocks of the multiplexer:
//!
//! * [`Operation`] is a single-assignment completion handle.
//! * [`Signal`] is an auto-reset event used as a wait condition.
//! * [`SerialRunner`] attempts queued items one at a time and parks them on a [`Signal`].
//! * [`queue`] contains [`HandoffQueue`](queue::HandoffQueue) and [`MultiQueue`](queue::MultiQueue).
//! * [`io`] defines channel contracts, messages, and the window update codec.

pub mod io;
mod operation;
pub mod queue;
mod runner;
mod signal;
pub mod utils;

pub use operation::{Continuation, Delivery, Operation};
pub use runner::{Attempt, Progress, SerialRunner};
pub use signal::Signal;
