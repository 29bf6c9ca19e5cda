//! Caller-facing error messages.
//!
//! Replies to the caller are sanitized; transport details are only logged.

/// The worker did not answer within the request timeout.
pub const SERVICE_TIMED_OUT: &str = "Service timed out";

/// The worker connection failed (sanitized - no address details).
pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable";
