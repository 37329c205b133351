//! # Chanmux errors
//!
//! All fallible operations return [`Result`] with a crate-wide [`Error`]. Errors are [`Clone`]
//! since a single failure of the underlying channel has to complete every pending
//! [`Operation`](crate::core::Operation).
//!
//! Wire-level violations are represented by a dedicated [`ProtocolError`]. Such errors are always
//! fatal for a multiplexer.

use std::sync::Arc;

/// Common result type returned by `chanmux` functions and methods.
pub type Result<T> = std::result::Result<T, Error>;

/// `chanmux` top-level error.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Attempt to complete an operation which has been already completed.
    #[error("operation is already completed")]
    AlreadyCompleted,

    /// Operation was not completed within the requested time.
    #[error("operation timed out")]
    Timeout,

    /// Channel (or queue) index is outside the allowed range.
    #[error("index {index} is out of range, expected less than {count}")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Number of valid indices.
        count: usize,
    },

    /// Queue has no items.
    #[error("queue is empty")]
    Empty,

    /// Resource (queue, runner, or channel) is closed.
    #[error("resource is closed")]
    Closed,

    /// Multiplexer has been closed and can't be used anymore.
    #[error("multiplexer is disposed")]
    Disposed,

    /// Underlying channel reached its end.
    #[error("end of stream")]
    EndOfStream,

    /// Payload can never be sent through this channel.
    #[error("payload of {len} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConf(String),

    /// Peer violated the wire protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error of the underlying transport.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Multiplexer was aborted because of a fatal failure.
    #[error("multiplexer aborted: {0}")]
    Aborted(Arc<Error>),
}

/// Wire protocol violations.
///
/// These errors are fatal: a multiplexer that has received a malformed frame is aborted without
/// any attempt to resynchronize.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Window update payload has a wrong size.
    #[error("window update has {0} bytes, expected 8")]
    MalformedWindowUpdate(usize),

    /// Window update refers to a channel which does not exist.
    #[error("window update targets unknown channel {0}")]
    UnknownWindowChannel(i32),

    /// Window update would push the window out of its bounds.
    #[error("illegal window delta {delta} on channel {channel}: window {window}, max {max_window}")]
    IllegalWindowDelta {
        /// Target channel.
        channel: usize,
        /// Received delta.
        delta: i32,
        /// Window before the update.
        window: u32,
        /// Maximum window.
        max_window: u32,
    },

    /// Frame refers to a channel which does not exist.
    #[error("frame received on unknown channel {0}")]
    UnknownChannel(i32),

    /// Frame header contains unknown frame type.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// Frame length is shorter than its header.
    #[error("frame length {0} is shorter than frame header")]
    FrameTooShort(usize),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl Error {
    /// Returns `true` if this error is fatal for a multiplexer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::Io(_) | Error::EndOfStream | Error::Aborted(_)
        )
    }
}
