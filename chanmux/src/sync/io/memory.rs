use crate::consts::MAX_FRAME_PAYLOAD_LENGTH;
use crate::core::io::MessageChannel;
use crate::core::queue::HandoffQueue;
use crate::core::utils::{Closable, Closer, UniqueId};

use crate::prelude::*;

/// <sup>[`sync`](crate::sync)</sup>
/// In-process message channel.
///
/// Memory channels are created in connected pairs by [`MemoryChannel::pair`]. Messages are passed
/// to the peer without encoding, and sends complete synchronously as soon as the message is in the
/// peer's inbox. Closing one end is observed by the other as the end of stream.
///
/// ```rust
/// use chanmux::prelude::*;
///
/// let (left, right) = MemoryChannel::pair();
///
/// left.send(DataMessage::new(0, &b"ping"[..])).unwrap();
/// assert_eq!(right.receive().unwrap().unwrap().payload().as_ref(), b"ping");
///
/// left.close();
/// assert!(right.receive().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MemoryChannel {
    id: UniqueId,
    closer: Closer,
    peer_state: Closable,
    inbox: HandoffQueue<Option<DataMessage>>,
    peer_inbox: HandoffQueue<Option<DataMessage>>,
    max_payload_length: usize,
}

impl MemoryChannel {
    /// Creates a connected pair with the same payload limit as a
    /// [`FramedChannel`](super::FramedChannel).
    pub fn pair() -> (Self, Self) {
        Self::pair_with_limit(MAX_FRAME_PAYLOAD_LENGTH)
    }

    /// Creates a connected pair with the specified payload limit.
    pub fn pair_with_limit(max_payload_length: usize) -> (Self, Self) {
        let left_closer = Closer::new();
        let right_closer = Closer::new();
        let left_inbox = HandoffQueue::new();
        let right_inbox = HandoffQueue::new();

        let left = Self {
            id: UniqueId::new(),
            peer_state: right_closer.to_closable(),
            closer: left_closer,
            inbox: left_inbox.clone(),
            peer_inbox: right_inbox.clone(),
            max_payload_length,
        };
        let right = Self {
            id: UniqueId::new(),
            peer_state: left.closer.to_closable(),
            closer: right_closer,
            inbox: right_inbox,
            peer_inbox: left_inbox,
            max_payload_length,
        };

        log::trace!("[{:?}] <-> [{:?}] memory channel pair", left.id, right.id);

        (left, right)
    }

    /// Number of messages sent by the peer and not received yet.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl MessageChannel for MemoryChannel {
    fn begin_send(&self, message: DataMessage) -> Operation<()> {
        if self.closer.is_closed() {
            return Operation::completed_error(Error::Closed);
        }
        if message.len() > self.max_payload_length {
            return Operation::completed_error(Error::PayloadTooLarge {
                len: message.len(),
                limit: self.max_payload_length,
            });
        }

        log::trace!(
            "[{:?}] send: channel={}, len={}",
            self.id,
            message.channel(),
            message.len()
        );

        match self.peer_inbox.enqueue(Some(message)) {
            Ok(_) => Operation::completed_ok(()),
            Err(err) => Operation::completed_error(err),
        }
    }

    fn begin_receive(&self) -> Operation<Option<DataMessage>> {
        if self.inbox.is_empty() && self.peer_state.is_closed() && !self.closer.is_closed() {
            return Operation::completed_ok(None);
        }
        self.inbox.begin_dequeue()
    }

    fn maximum_payload_length(&self) -> usize {
        self.max_payload_length
    }

    fn close(&self) {
        if !self.closer.close() {
            return;
        }
        log::trace!("[{:?}] closing memory channel", self.id);

        let _ = self.peer_inbox.enqueue(None);
        self.inbox.close();
    }

    fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_complete_synchronously() {
        let (left, right) = MemoryChannel::pair();

        let receive = right.begin_receive();
        let send = left.begin_send(DataMessage::new(1, &b"abc"[..]));

        assert!(send.completed_synchronously());
        assert_eq!(receive.wait().unwrap().unwrap().channel(), 1);
    }

    #[test]
    fn peer_close_is_end_of_stream() {
        let (left, right) = MemoryChannel::pair();
        left.send(DataMessage::new(0, &b"last"[..])).unwrap();
        drop(left);

        assert!(right.receive().unwrap().is_some());
        assert!(right.receive().unwrap().is_none());
        assert!(right.receive().unwrap().is_none());
        assert!(matches!(
            right.send(DataMessage::new(0, &b"lost"[..])),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn own_close_fails_receivers() {
        let (left, _right) = MemoryChannel::pair();
        let receive = left.begin_receive();

        left.close();

        assert!(matches!(receive.wait(), Err(Error::Closed)));
        assert!(matches!(left.receive(), Err(Error::Closed)));
    }

    #[test]
    fn payload_limit() {
        let (left, _right) = MemoryChannel::pair_with_limit(4);

        assert!(matches!(
            left.send(DataMessage::new(0, vec![0u8; 5])),
            Err(Error::PayloadTooLarge { len: 5, limit: 4 })
        ));
        assert_eq!(left.maximum_payload_length(), 4);
    }
}
