//! Bootstrap utilities for relaycore binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV_VAR: &str = "RELAYCORE_LOG";

/// Initialize tracing with RELAYCORE_LOG environment variable.
///
/// Defaults to "info" level if RELAYCORE_LOG is not set. Output goes to
/// stderr so line-oriented binaries keep stdout for payloads.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
