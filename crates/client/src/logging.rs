//! Log output for the monitor binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host process.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "surveilx_client=debug";

/// Install the `fmt` subscriber, filtered by `RUST_LOG` or
/// [`DEFAULT_FILTER`]. Later calls are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // Logs go to stderr so prompts on stdout stay readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
