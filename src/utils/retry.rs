//! Retry utilities: backoff builders for transport connections.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for connecting sockets to a peer that may not be bound yet.
///
/// - Min delay: 20ms
/// - Max delay: 1s
/// - Max attempts: 20
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(20)
        .with_jitter()
}
