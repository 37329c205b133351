use std::thread;

use chanmux::sync::mux::Multiplexer;

use chanmux::prelude::*;

const N_CHANNELS: usize = 3;
const N_MESSAGES: usize = 100;
const MAX_WINDOW: u32 = 1024;

fn producer(mux: &Multiplexer, channel: usize) {
    for i in 0..N_MESSAGES {
        let payload = format!("channel #{channel}, message #{i}");
        mux.send(DataMessage::new(channel, payload.into_bytes()))
            .unwrap();
    }
    log::info!("[alice] channel #{channel}: all messages sent");
}

fn run() {
    let (left, right) = MemoryChannel::pair();
    let conf = MuxConf::builder()
        .inbound_channels(N_CHANNELS)
        .outbound_channels(N_CHANNELS)
        .max_window(MAX_WINDOW)
        .build();

    let alice = Multiplexer::new(left, conf.clone()).unwrap();
    let bob = Multiplexer::new(right, conf).unwrap();

    thread::scope(|scope| {
        for channel in 0..N_CHANNELS {
            let alice = &alice;
            scope.spawn(move || producer(alice, channel));
        }

        for channel in 0..N_CHANNELS {
            for i in 0..N_MESSAGES {
                let message = bob.receive(channel).unwrap();
                let text = String::from_utf8_lossy(message.payload());
                log::debug!("[bob] {text}");
                assert_eq!(text, format!("channel #{channel}, message #{i}"));
            }
            log::info!("[bob] channel #{channel}: all messages received");
        }
    });

    alice.close();
    assert!(matches!(bob.receive(0), Err(Error::Aborted(_))));
}

fn main() {
    // Setup logger
    env_logger::builder()
        .filter_level(log::LevelFilter::Info) // Suppress everything below `info` for third-party modules.
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Info) // Allow everything from current package
        .init();

    run();
}

#[cfg(test)]
#[test]
fn loopback() {
    run();
}
