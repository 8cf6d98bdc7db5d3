//! Logging setup

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `filter` (e.g. `"info"`,
/// `"airdrop_coordinator=debug"`).
///
/// `RUST_LOG` takes precedence when set. Repeated calls are ignored. An
/// unparsable filter falls back to `info`.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
