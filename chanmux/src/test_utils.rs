//! # Test utils
//!
//! ⚠️ Helpers for complex tests and benchmarks. Do not use in production. ⚠️

use std::thread;
use std::time::Duration;

#[cfg(feature = "sync")]
use crate::sync::io::MemoryChannel;
#[cfg(feature = "sync")]
use crate::sync::mux::{Multiplexer, MuxConf};

const WAIT_DURATION: Duration = Duration::from_millis(20);
const WAIT_LONG_DURATION: Duration = Duration::from_millis(200);

/// Creates two multiplexers connected by an in-memory channel.
#[cfg(feature = "sync")]
pub fn mux_pair(conf: MuxConf) -> crate::errors::Result<(Multiplexer, Multiplexer)> {
    let (left, right) = MemoryChannel::pair();
    let alice = Multiplexer::new(left, conf.clone())?;
    let bob = Multiplexer::new(right, conf)?;
    Ok((alice, bob))
}

/// Sleeps for a short time, enough for detached continuations to run.
pub fn wait() {
    thread::sleep(WAIT_DURATION)
}

/// Sleeps for a longer time.
pub fn wait_long() {
    thread::sleep(WAIT_LONG_DURATION)
}

#[cfg(test)]
pub(crate) fn init_logger() {
    use std::sync::Once;

    static INIT_LOGGER: Once = Once::new();
    const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Trace;

    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder()
            // Suppress everything below `warn` for third-party modules
            .filter_level(log::LevelFilter::Warn)
            // Allow everything above `LOG_LEVEL` from current package
            .filter_module(env!("CARGO_PKG_NAME"), LOG_LEVEL)
            .is_test(true)
            .try_init();
    });
}
