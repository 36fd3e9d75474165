//! Logging setup for the nestsweep CLI.
//!
//! Library code emits `tracing` events; the binary installs a compact
//! formatter on stderr so stdout stays machine readable.
//!
//! The filter is chosen in this order:
//! 1. `--verbose`: debug for nestsweep
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. info for nestsweep

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "nestsweep=info";

/// The filter for the given flags.
pub fn build_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("nestsweep=debug")
    } else if quiet {
        EnvFilter::new("nestsweep=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logger(verbose: bool, quiet: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(build_filter(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}
