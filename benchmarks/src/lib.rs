#[cfg(feature = "handoff")]
pub mod handoff;
#[cfg(feature = "mux")]
pub mod mux;

#[cfg(feature = "async")]
pub mod asnc;
