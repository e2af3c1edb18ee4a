pub mod logging;

/// Install the `env_logger` backend. `RUST_LOG` overrides the default `info`
/// level. Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
