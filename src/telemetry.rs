//! Logging setup
//!
//! Installs a `tracing` fmt subscriber filtered by `RUST_LOG`. Logs go to
//! stderr so the CLI can keep stdout for its JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "form_cascade=info";

/// Install the global subscriber. Calling it twice is harmless; the second
/// call reports the error instead of panicking.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
}
