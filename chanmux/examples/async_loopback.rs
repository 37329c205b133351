use std::time::Duration;

use bytes::Bytes;

use chanmux::prelude::*;

const N_MESSAGES: usize = 20;

async fn run() {
    let (left, right) = MemoryChannel::pair();
    let conf = MuxConf::builder()
        .max_window(64)
        .window_update_timeout(Some(Duration::from_secs(1)))
        .build();

    let alice = Multiplexer::new(left, conf.clone()).unwrap();
    let bob = Multiplexer::new(right, conf).unwrap();

    let sender = alice.get_channel(0).unwrap();
    let producer = tokio::task::spawn(async move {
        for i in 0..N_MESSAGES {
            let payload = Bytes::from(format!("ping #{i}"));
            sender.send_async(payload).await.unwrap();
        }
    });

    let receiver = bob.get_channel(0).unwrap();
    for i in 0..N_MESSAGES {
        let payload = receiver.receive_async().await.unwrap();
        log::info!("[bob] {}", String::from_utf8_lossy(&payload));
        assert_eq!(payload, Bytes::from(format!("ping #{i}")));
    }

    producer.await.unwrap();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    // Setup logger
    env_logger::builder()
        .filter_level(log::LevelFilter::Info) // Suppress everything below `info` for third-party modules.
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Info) // Allow everything from current package
        .init();

    run().await;
}

#[cfg(test)]
#[tokio::test(flavor = "multi_thread")]
async fn async_loopback() {
    run().await;
}
