//! Opt-in log output for tests.
//!
//! The crate only emits `tracing` events; nothing is printed unless a
//! subscriber is installed. Call one of these at the top of a test and set
//! `RUST_LOG=socket_expect=trace` to follow handshakes, frames and verdicts.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable subscriber writing through the test harness.
///
/// Returns false if a global subscriber was already set, which is expected
/// when many tests call this.
pub fn init_test_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// Install a JSON-lines subscriber, for CI log collectors
pub fn init_json_tracing() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}
