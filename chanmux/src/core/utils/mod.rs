//! Common utils.

pub mod closable;
mod detached;
mod unique_id;

#[doc(inline)]
pub use closable::{Closable, Closer};
pub use unique_id::UniqueId;

pub(crate) use detached::{lock, spawn_detached};
