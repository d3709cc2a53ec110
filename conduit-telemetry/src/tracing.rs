use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable consulted for the log filter.
const LOG_FILTER_ENV_NAME: &str = "RUST_LOG";

/// Filter used by tests when [`LOG_FILTER_ENV_NAME`] is not set.
const TEST_DEFAULT_FILTER: &str = "conduit=debug";

static TEST_TRACING: Once = Once::new();

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to `{app_name}=info`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(app_name: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV_NAME)
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=info", app_name.replace('-', "_"))));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Installs a test-writer subscriber once per process.
///
/// Safe to call from every test; only the first call installs the subscriber. Output goes
/// through the test harness capture so it is only shown for failing tests.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_FILTER_ENV_NAME)
            .unwrap_or_else(|_| EnvFilter::new(TEST_DEFAULT_FILTER));

        // Another harness may have installed a subscriber already, which is fine for tests.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
