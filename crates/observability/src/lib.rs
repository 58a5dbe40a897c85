//! Process-wide tracing setup shared by binaries and tests.

/// Install the JSON tracing subscriber.
///
/// Safe to call multiple times; only the first call installs anything.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filters, output format).
pub mod tracing;
