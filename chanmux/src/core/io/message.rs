use bytes::Bytes;

/// Message tagged with a channel id.
///
/// Data messages are the unit of transfer of a [`MessageChannel`](super::MessageChannel). The
/// payload is reference-counted, cloning a message does not copy its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataMessage {
    channel: usize,
    payload: Bytes,
}

impl DataMessage {
    /// Creates a message for `channel`.
    pub fn new(channel: usize, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Channel id.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Message payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consumes the message and returns its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
