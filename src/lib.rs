//! Relaycore - request/response workers with a shared audit log
//!
//! Worker services answer requests over a rendezvous socket, a gateway
//! bridges external payloads to them with correlation ids, and every
//! component publishes audit events to a topic-filtered log aggregator.

pub mod bus;
pub mod config;
pub mod control;
pub mod gateway;
pub mod logger;
pub mod protocol;
pub mod services;
pub mod transport;
pub mod utils;
