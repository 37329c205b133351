use std::net::{TcpListener, TcpStream};
use std::thread;

use bytes::Bytes;
use portpicker::{pick_unused_port, Port};

use chanmux::sync::mux::{ChannelView, Multiplexer};

use chanmux::prelude::*;

const HOST: &str = "127.0.0.1";
const N_ITER: usize = 10;
const CONTROL: usize = 0;
const DATA: usize = 1;

fn port() -> Port {
    pick_unused_port().unwrap()
}

fn addr(port: Port) -> String {
    format!("{HOST}:{}", port)
}

fn conf() -> MuxConf {
    MuxConf::builder()
        .inbound_channels(2)
        .outbound_channels(2)
        .max_window(4096)
        .build()
}

fn serve(stream: TcpStream) {
    let mux = Multiplexer::tcp(stream, conf()).unwrap();
    let control = mux.get_channel(CONTROL).unwrap();
    let data = mux.get_channel(DATA).unwrap();

    loop {
        let request = match data.receive() {
            Ok(request) => request,
            Err(err) => {
                log::warn!("[server] client disconnected: {err}");
                break;
            }
        };
        log::info!("[server] request of {} bytes", request.len());

        let checksum: u32 = request.iter().map(|byte| *byte as u32).sum();
        control
            .send(Bytes::copy_from_slice(&checksum.to_be_bytes()))
            .unwrap();
    }
}

fn request(control: &ChannelView, data: &ChannelView, i: usize) -> u32 {
    let payload = vec![(i % 256) as u8; 100 + i];
    data.send(Bytes::from(payload)).unwrap();

    let response = control.receive().unwrap();
    u32::from_be_bytes([response[0], response[1], response[2], response[3]])
}

fn run(addr: &str) {
    let listener = TcpListener::bind(addr).unwrap();
    let server = thread::spawn(move || {
        let (stream, peer) = listener.accept().unwrap();
        log::info!("[server] accepted {peer}");
        serve(stream);
    });

    let client = Multiplexer::tcp(TcpStream::connect(addr).unwrap(), conf()).unwrap();
    let control = client.get_channel(CONTROL).unwrap();
    let data = client.get_channel(DATA).unwrap();

    for i in 0..N_ITER {
        let checksum = request(&control, &data, i);
        log::info!("[client] response #{i}: checksum={checksum}");
        assert_eq!(checksum, ((i % 256) * (100 + i)) as u32);
    }

    client.close();
    server.join().unwrap();
}

fn main() {
    // Setup logger
    env_logger::builder()
        .filter_level(log::LevelFilter::Info) // Suppress everything below `info` for third-party modules.
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Info) // Allow everything from current package
        .init();

    run(addr(port()).as_str());
}

#[cfg(test)]
#[test]
fn tcp_mux() {
    run(addr(port()).as_str());
}
