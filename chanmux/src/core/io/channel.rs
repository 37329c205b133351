use bytes::Bytes;

use crate::core::io::DataMessage;
use crate::core::Operation;

use crate::prelude::*;

/// Physical duplex channel of channel-tagged messages.
///
/// Implementors never block in `begin_*` methods: they return an [`Operation`] that is completed
/// either synchronously or later from another thread.
pub trait MessageChannel: Send + Sync + 'static {
    /// Starts sending a message.
    ///
    /// Operation is completed once the message has been handed over to the transport.
    fn begin_send(&self, message: DataMessage) -> Operation<()>;

    /// Starts receiving the next message.
    ///
    /// Operation is completed with [`None`] when the channel has reached its end.
    fn begin_receive(&self) -> Operation<Option<DataMessage>>;

    /// Maximum payload length this channel can carry in a single message.
    fn maximum_payload_length(&self) -> usize;

    /// Closes the channel.
    ///
    /// Pending and future operations fail. Closing is idempotent.
    fn close(&self);

    /// Returns `true` if channel is closed.
    fn is_closed(&self) -> bool;

    /// Sends a message and blocks until it is handed over to the transport.
    fn send(&self, message: DataMessage) -> Result<()> {
        self.begin_send(message).wait()
    }

    /// Blocks until the next message is received.
    fn receive(&self) -> Result<Option<DataMessage>> {
        self.begin_receive().wait()
    }
}

/// Logical channel of raw payloads.
///
/// Usage errors, such as an unsupported direction or an oversized payload, are returned
/// synchronously. Failures of the transport complete the returned [`Operation`].
pub trait PayloadChannel {
    /// Returns `true` if this channel can send payloads.
    fn can_send(&self) -> bool;

    /// Returns `true` if this channel can receive payloads.
    fn can_receive(&self) -> bool;

    /// Maximum payload length accepted by [`PayloadChannel::begin_send`].
    fn maximum_payload_length(&self) -> usize;

    /// Number of bytes the peer is currently ready to accept.
    fn receive_window(&self) -> usize;

    /// Starts sending a payload.
    fn begin_send(&self, payload: Bytes) -> Result<Operation<()>>;

    /// Starts receiving a payload.
    fn begin_receive(&self) -> Result<Operation<Bytes>>;

    /// Sends a payload and blocks until it is dispatched.
    fn send(&self, payload: Bytes) -> Result<()> {
        self.begin_send(payload)?.wait()
    }

    /// Blocks until a payload is received.
    fn receive(&self) -> Result<Bytes> {
        self.begin_receive()?.wait()
    }
}
