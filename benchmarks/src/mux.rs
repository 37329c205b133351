use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::SystemTime;

use portpicker::pick_unused_port;

use chanmux::prelude::*;
use chanmux::test_utils::mux_pair;

const PAYLOAD_SIZE: usize = 1024;

fn conf(n_channels: usize, max_window: u32) -> MuxConf {
    MuxConf::builder()
        .inbound_channels(n_channels)
        .outbound_channels(n_channels)
        .max_window(max_window)
        .window_update_timeout(None)
        .build()
}

fn pump(sender: &Multiplexer, receiver: &Multiplexer, n_channels: usize, n_iter: usize) {
    thread::scope(|scope| {
        for channel in 0..n_channels {
            scope.spawn(move || {
                for i in 0..n_iter {
                    let payload = vec![(i % 256) as u8; PAYLOAD_SIZE];
                    sender.send(DataMessage::new(channel, payload)).unwrap();
                }
            });
        }

        for channel in 0..n_channels {
            scope.spawn(move || {
                for _ in 0..n_iter {
                    receiver.receive(channel).unwrap();
                }
            });
        }
    });
}

/// Transfers messages over an in-memory channel.
pub fn benchmark_mux_memory(n_channels: usize, n_iter: usize) {
    let (alice, bob) = mux_pair(conf(n_channels, 16 * PAYLOAD_SIZE as u32)).unwrap();

    let start = SystemTime::now();
    pump(&alice, &bob, n_channels, n_iter);

    let duration = SystemTime::now().duration_since(start).unwrap();
    log::info!(
        "[benchmark_mux_memory] {n_iter} messages of {PAYLOAD_SIZE} bytes over {n_channels} channels: {}s",
        duration.as_secs_f32()
    )
}

/// Transfers messages over a loopback TCP connection.
pub fn benchmark_mux_tcp(n_channels: usize, n_iter: usize) {
    let addr = format!("127.0.0.1:{}", pick_unused_port().unwrap());
    let listener = TcpListener::bind(addr.as_str()).unwrap();
    let client = TcpStream::connect(addr.as_str()).unwrap();
    let (server, _) = listener.accept().unwrap();

    let conf = conf(n_channels, 16 * PAYLOAD_SIZE as u32);
    let alice = Multiplexer::tcp(client, conf.clone()).unwrap();
    let bob = Multiplexer::tcp(server, conf).unwrap();

    let start = SystemTime::now();
    pump(&alice, &bob, n_channels, n_iter);

    let duration = SystemTime::now().duration_since(start).unwrap();
    log::info!(
        "[benchmark_mux_tcp] {n_iter} messages of {PAYLOAD_SIZE} bytes over {n_channels} channels: {}s",
        duration.as_secs_f32()
    )
}
