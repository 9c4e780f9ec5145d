use tracing_subscriber::EnvFilter;

/// Install the stderr `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
/// Stdout stays reserved for command output.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
