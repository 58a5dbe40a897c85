//! JSON log output filtered by `BINSTOCK_LOG`, falling back to `RUST_LOG`,
//! then to `info`.

use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`.
pub const ENV_LOG_FILTER: &str = "BINSTOCK_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Resolve the filter from the environment.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG_FILTER)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install a JSON subscriber. Returns `false` if one was already installed.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init()
        .is_ok()
}
