//! Helpers shared by the integration tests

use tracing_subscriber::EnvFilter;

/// Route library logs to the test output when `RUST_LOG` is set
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
