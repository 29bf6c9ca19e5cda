//! Shared helpers for binaries and sockets.

pub mod bootstrap;
pub mod retry;
