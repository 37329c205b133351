use std::time::SystemTime;

use chanmux::prelude::*;
use chanmux::test_utils::mux_pair;

const PAYLOAD_SIZE: usize = 1024;

async fn pump(n_channels: usize, n_iter: usize) {
    let conf = MuxConf::builder()
        .inbound_channels(n_channels)
        .outbound_channels(n_channels)
        .max_window(16 * PAYLOAD_SIZE as u32)
        .window_update_timeout(None)
        .build();
    let (alice, bob) = mux_pair(conf).unwrap();

    let mut tasks = Vec::new();
    for channel in 0..n_channels {
        let sender = alice.get_channel(channel).unwrap();
        tasks.push(tokio::spawn(async move {
            for i in 0..n_iter {
                let payload = vec![(i % 256) as u8; PAYLOAD_SIZE];
                sender.send_async(payload.into()).await.unwrap();
            }
        }));

        let receiver = bob.get_channel(channel).unwrap();
        tasks.push(tokio::spawn(async move {
            for _ in 0..n_iter {
                receiver.receive_async().await.unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
}

/// Transfers messages through asynchronous channel views.
pub fn benchmark_async_views(n_channels: usize, n_iter: usize) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .unwrap();

    let start = SystemTime::now();
    runtime.block_on(pump(n_channels, n_iter));

    let duration = SystemTime::now().duration_since(start).unwrap();
    log::info!(
        "[benchmark_async_views] {n_iter} messages of {PAYLOAD_SIZE} bytes over {n_channels} channels: {}s",
        duration.as_secs_f32()
    )
}
