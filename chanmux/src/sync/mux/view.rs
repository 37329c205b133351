use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;

use crate::core::io::PayloadChannel;
use crate::core::utils::UniqueId;
use crate::sync::mux::multiplexer::Shared;

use crate::prelude::*;

/// <sup>[`sync`](crate::sync)</sup>
/// Bidirectional view of a single multiplexer channel.
///
/// Created by [`Multiplexer::get_channel`](super::Multiplexer::get_channel). Sends go to the
/// outbound channel and receives come from the inbound channel with the same id.
///
/// Payloads are limited to half of the maximum window, so at least two messages can be in flight.
///
/// ```rust
/// use bytes::Bytes;
/// use chanmux::prelude::*;
///
/// let (left, right) = MemoryChannel::pair();
/// let conf = MuxConf::builder().max_window(128).build();
/// let alice = Multiplexer::new(left, conf.clone()).unwrap();
/// let bob = Multiplexer::new(right, conf).unwrap();
///
/// let (tx, rx) = (alice.get_channel(0).unwrap(), bob.get_channel(0).unwrap());
/// assert_eq!(tx.maximum_payload_length(), 64);
///
/// tx.send(Bytes::from_static(b"over")).unwrap();
/// assert_eq!(rx.receive().unwrap().as_ref(), b"over");
/// ```
#[derive(Clone)]
pub struct ChannelView {
    shared: Arc<Shared>,
    channel: usize,
}

impl Debug for ChannelView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelView")
            .field("mux", &self.shared.id())
            .field("channel", &self.channel)
            .finish()
    }
}

impl ChannelView {
    pub(super) fn new(shared: Arc<Shared>, channel: usize) -> Self {
        Self { shared, channel }
    }

    /// Channel id.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Identifier of the multiplexer this view belongs to.
    pub fn mux_id(&self) -> UniqueId {
        self.shared.id()
    }
}

impl PayloadChannel for ChannelView {
    fn can_send(&self) -> bool {
        !self.shared.is_closed()
    }

    fn can_receive(&self) -> bool {
        !self.shared.is_closed()
    }

    fn maximum_payload_length(&self) -> usize {
        self.shared
            .physical()
            .maximum_payload_length()
            .min((self.shared.conf().max_window() >> 1) as usize)
    }

    /// Current send window of the outbound channel.
    fn receive_window(&self) -> usize {
        self.shared.send_window(self.channel).unwrap_or(0) as usize
    }

    fn begin_send(&self, payload: Bytes) -> Result<Operation<()>> {
        let limit = self.maximum_payload_length();
        if payload.len() > limit {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                limit,
            });
        }
        self.shared
            .begin_send(DataMessage::new(self.channel, payload))
    }

    fn begin_receive(&self) -> Result<Operation<Bytes>> {
        Ok(self
            .shared
            .begin_receive(self.channel)?
            .map(|result| result.map(DataMessage::into_payload)))
    }
}
