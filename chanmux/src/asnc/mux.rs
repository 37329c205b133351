use bytes::Bytes;

use crate::sync::mux::{ChannelView, Multiplexer};

use crate::prelude::*;

impl Multiplexer {
    /// <sup>[`async`](crate::asnc)</sup>
    /// Sends a message and resolves once it is handed over to the physical channel.
    pub async fn send_async(&self, message: DataMessage) -> Result<()> {
        self.begin_send(message)?.completion().await
    }

    /// <sup>[`async`](crate::asnc)</sup>
    /// Resolves with the next message of an inbound channel.
    pub async fn receive_async(&self, channel: usize) -> Result<DataMessage> {
        self.begin_receive(channel)?.completion().await
    }
}

impl ChannelView {
    /// <sup>[`async`](crate::asnc)</sup>
    /// Sends a payload and resolves once it is dispatched.
    pub async fn send_async(&self, payload: Bytes) -> Result<()> {
        self.begin_send(payload)?.completion().await
    }

    /// <sup>[`async`](crate::asnc)</sup>
    /// Resolves with the next payload.
    pub async fn receive_async(&self) -> Result<Bytes> {
        self.begin_receive()?.completion().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{init_logger, mux_pair};

    fn conf() -> MuxConf {
        MuxConf::builder()
            .inbound_channels(2)
            .outbound_channels(2)
            .max_window(16)
            .window_update_timeout(None)
            .build()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocked_sender_resumes_after_reads() {
        init_logger();
        let (alice, bob) = mux_pair(conf()).unwrap();

        for n in 0..2u8 {
            alice.send_async(DataMessage::new(1, vec![n; 8])).await.unwrap();
        }
        let blocked = alice.begin_send(DataMessage::new(1, vec![2u8; 8])).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_completed());

        for n in 0..3u8 {
            let message = bob.receive_async(1).await.unwrap();
            assert_eq!(message.payload()[0], n);
        }
        tokio::time::timeout(Duration::from_secs(5), blocked.completion())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn views_are_awaitable() {
        init_logger();
        let (alice, bob) = mux_pair(conf()).unwrap();
        let (tx, rx) = (alice.get_channel(0).unwrap(), bob.get_channel(0).unwrap());

        tx.send_async(Bytes::from_static(b"async")).await.unwrap();
        assert_eq!(rx.receive_async().await.unwrap().as_ref(), b"async");

        alice.close();
        assert!(matches!(
            tx.send_async(Bytes::from_static(b"late")).await,
            Err(Error::Disposed)
        ));
    }
}
