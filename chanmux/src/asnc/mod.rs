//! # Chanmux asynchronous adapters
//!
//! Asynchronous API is a thin layer over the [`sync`](crate::sync) multiplexer: every
//! [`Operation`](crate::core::Operation) can be awaited with
//! [`Operation::completion`](crate::core::Operation::completion), and multiplexers and channel
//! views provide `async` counterparts of their blocking methods.
//!
//! I/O still happens on the threads of the physical channel. Adapters never block the executor.

mod completion;
mod mux;
