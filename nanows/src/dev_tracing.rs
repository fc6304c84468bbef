//! Tracing setup for demos and tests.
//!
//! Socket lifecycle lines are logged at `trace`, or at `debug` for sockets
//! built with `SocketOptions::with_debug(true)`. Run with
//! `RUST_LOG=nanows=debug` to see the latter.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// No-op when `RUST_LOG` is unset or a global subscriber is already
/// installed, so every test can call it.
pub fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}
