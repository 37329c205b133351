use std::net::{TcpListener, TcpStream};
use std::sync::Once;
use std::thread;
use std::time::Duration;

use portpicker::Port;

use chanmux::sync::io::pipe;
use chanmux::sync::mux::Multiplexer;

use chanmux::prelude::*;

static INIT: Once = Once::new();
const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Debug;
const HOST: &str = "127.0.0.1";
const WAIT_DURATION: Duration = Duration::from_millis(50);
const TIMEOUT: Duration = Duration::from_secs(10);

fn unused_port() -> Port {
    portpicker::pick_unused_port().unwrap()
}

fn make_addr(port: Port) -> String {
    format!("{HOST}:{port}")
}

fn wait() {
    thread::sleep(WAIT_DURATION)
}

fn initialize() {
    INIT.call_once(|| {
        env_logger::builder()
            // Suppress everything below `warn` for third-party modules
            .filter_level(log::LevelFilter::Warn)
            // Allow everything above `LOG_LEVEL` from current package
            .filter_module(env!("CARGO_PKG_NAME"), LOG_LEVEL)
            .init();
    });
}

fn make_conf(channels: usize, max_window: u32) -> MuxConf {
    MuxConf::builder()
        .inbound_channels(channels)
        .outbound_channels(channels)
        .max_window(max_window)
        .window_update_timeout(Some(Duration::from_secs(2)))
        .build()
}

fn tcp_pair(conf: MuxConf) -> (Multiplexer, Multiplexer) {
    let addr = make_addr(unused_port());
    let listener = TcpListener::bind(&addr).unwrap();

    let client = TcpStream::connect(&addr).unwrap();
    let (server, _) = listener.accept().unwrap();

    (
        Multiplexer::tcp(server, conf.clone()).unwrap(),
        Multiplexer::tcp(client, conf).unwrap(),
    )
}

fn pipe_pair(conf: MuxConf) -> (Multiplexer, Multiplexer) {
    let ((left_reader, left_writer), (right_reader, right_writer)) = pipe::duplex();
    (
        Multiplexer::over_stream(left_reader, left_writer, conf.clone()).unwrap(),
        Multiplexer::over_stream(right_reader, right_writer, conf).unwrap(),
    )
}

#[test]
fn tcp_channels_are_independent() {
    initialize();
    const N_MESSAGES: u8 = 50;

    let (server, client) = tcp_pair(make_conf(4, 256));

    let handles: Vec<_> = (0..4)
        .map(|channel| {
            let view = client.get_channel(channel).unwrap();
            thread::spawn(move || {
                for n in 0..N_MESSAGES {
                    view.send(vec![n; 100].into()).unwrap();
                }
            })
        })
        .collect();

    for channel in 0..4 {
        for n in 0..N_MESSAGES {
            let message = server.begin_receive(channel).unwrap().wait_timeout(TIMEOUT).unwrap();
            assert_eq!(message.channel(), channel);
            assert_eq!(message.len(), 100);
            assert_eq!(message.payload()[0], n);
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    wait();
    for channel in 0..4 {
        assert_eq!(client.send_window(channel).unwrap(), 256);
        assert_eq!(server.receive_budget(channel).unwrap(), 256);
    }
}

#[test]
fn tcp_echo() {
    initialize();

    let (server, client) = tcp_pair(make_conf(1, 1024));

    let echo = thread::spawn(move || {
        while let Ok(message) = server.receive(0) {
            if server.send(message).is_err() {
                break;
            }
        }
    });

    for n in 0..20usize {
        let payload = vec![n as u8; n * 10];
        client.send(DataMessage::new(0, payload.clone())).unwrap();
        let echoed = client.begin_receive(0).unwrap().wait_timeout(TIMEOUT).unwrap();
        assert_eq!(echoed.payload().as_ref(), payload.as_slice());
    }

    client.close();
    echo.join().unwrap();
}

#[test]
fn closing_one_side_aborts_the_other() {
    initialize();

    let (server, client) = tcp_pair(make_conf(2, 64));
    let pending = server.begin_receive(1).unwrap();

    client.close();

    match pending.wait_timeout(TIMEOUT) {
        Err(Error::Aborted(cause)) => assert!(cause.is_fatal()),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(server.is_closed());
    assert!(matches!(client.receive(0), Err(Error::Disposed)));
}

#[test]
fn slow_reader_blocks_sender() {
    initialize();

    let (alice, bob) = pipe_pair(make_conf(1, 100));

    alice.send(DataMessage::new(0, vec![0u8; 60])).unwrap();
    let blocked = alice.begin_send(DataMessage::new(0, vec![1u8; 60])).unwrap();

    wait();
    assert!(!blocked.is_completed());
    assert_eq!(alice.send_window(0).unwrap(), 40);

    assert_eq!(bob.receive(0).unwrap().payload()[0], 0);
    blocked.wait_timeout(TIMEOUT).unwrap();
    assert_eq!(bob.receive(0).unwrap().payload()[0], 1);
}

#[test]
fn oversized_payloads_are_rejected() {
    initialize();

    let (alice, _bob) = pipe_pair(make_conf(1, 100));

    assert!(matches!(
        alice.begin_send(DataMessage::new(0, vec![0u8; 101])),
        Err(Error::PayloadTooLarge { len: 101, limit: 100 })
    ));
    assert!(!alice.is_closed());
}
