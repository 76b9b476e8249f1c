//! Logging Setup
//!
//! Convenience initializer for hosts embedding the client. Library code only
//! emits `tracing` events; installing a subscriber is the host's decision.

use tracing_subscriber::EnvFilter;

/// Install a global tracing subscriber filtered by `EASEL_LOG`
///
/// Falls back to `info` when the variable is unset or unparseable.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("EASEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
