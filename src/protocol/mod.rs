//! Wire types shared by the gateway, worker and log aggregator.
//!
//! Requests and responses are UTF-8 JSON objects keyed by `requestId` and
//! `requestType`. Log events travel on the fan-out channel as either a JSON
//! object or plain text. Control commands are reserved literal strings.

pub mod control;
mod event;
mod message;

pub use event::LogEvent;
pub use message::{ErrorKind, ErrorReply, Fields, Outcome, Request, Response};
