//! Shared logging setup for binaries built on the trace model.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber filtered by `env_filter` (e.g. `info` or
/// `ft_select=debug,warn`).
///
/// Falls back to `info` if the filter does not parse. Calling this twice is harmless; the second
/// installation is ignored.
pub fn setup(env_filter: &str) {
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .try_init();
}
