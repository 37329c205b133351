#[cfg(feature = "async")]
use chanmux_benchmarks::asnc::benchmark_async_views;
#[cfg(feature = "handoff")]
use chanmux_benchmarks::handoff::{benchmark_handoff_collect, benchmark_handoff_waiters};
#[cfg(feature = "mux")]
use chanmux_benchmarks::mux::{benchmark_mux_memory, benchmark_mux_tcp};

fn main() {
    // Setup logger
    env_logger::builder()
        .filter_level(log::LevelFilter::Info) // Suppress everything below `info` for third-party modules.
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Trace) // Allow everything from current package
        .init();

    #[cfg(feature = "handoff")]
    {
        log::info!("[benchmark_handoff_collect]");
        benchmark_handoff_collect(100, 1_000);

        log::info!("[benchmark_handoff_waiters]");
        benchmark_handoff_waiters(100, 1_000);
    }

    #[cfg(feature = "mux")]
    {
        log::info!("[benchmark_mux_memory]");
        benchmark_mux_memory(8, 10_000);

        log::info!("[benchmark_mux_tcp]");
        benchmark_mux_tcp(8, 10_000);
    }

    #[cfg(feature = "async")]
    {
        log::info!("[benchmark_async_views]");
        benchmark_async_views(8, 10_000);
    }
}

#[cfg(test)]
mod benchmark_tests {
    #[test]
    #[cfg(feature = "handoff")]
    fn run_benchmark_handoff_collect() {
        super::benchmark_handoff_collect(10, 100);
    }

    #[test]
    #[cfg(feature = "handoff")]
    fn run_benchmark_handoff_waiters() {
        super::benchmark_handoff_waiters(10, 100);
    }

    #[test]
    #[cfg(feature = "mux")]
    fn run_benchmark_mux_memory() {
        super::benchmark_mux_memory(2, 100);
    }

    #[test]
    #[cfg(feature = "mux")]
    fn run_benchmark_mux_tcp() {
        super::benchmark_mux_tcp(2, 100);
    }

    #[test]
    #[cfg(feature = "async")]
    fn run_benchmark_async_views() {
        super::benchmark_async_views(2, 100);
    }
}
