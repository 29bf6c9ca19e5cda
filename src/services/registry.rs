//! Request handlers keyed by `requestType`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::protocol::{Fields, Outcome, Request, Response};

/// Why a handler refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}

/// Serves one request type.
///
/// `handle` is a pure function of the request; the worker merges
/// `requestId` and `requestType` into the returned body.
pub trait RequestHandler: Send + Sync {
    fn request_type(&self) -> &str;

    fn handle(&self, request: &Request) -> Result<Fields, HandlerError>;

    /// Detail worth recording when the request arrives.
    fn describe(&self, _request: &Request) -> Option<String> {
        None
    }

    /// Detail worth recording when the response leaves.
    fn summarize(&self, _body: &Fields) -> Option<String> {
        None
    }
}

/// Dispatch table from `requestType` to handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. A later handler for the same type replaces the earlier.
    pub fn with(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.handlers
            .insert(handler.request_type().to_string(), Arc::new(handler));
        self
    }

    pub fn get(&self, request_type: &str) -> Option<&dyn RequestHandler> {
        self.handlers.get(request_type).map(|h| h.as_ref())
    }

    /// Registered request types, sorted.
    pub fn request_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Run the handler for `request`, if there is one.
    pub fn dispatch(&self, request: &Request) -> Outcome {
        let Some(handler) = self.get(&request.request_type) else {
            debug!(request_type = %request.request_type, "No handler registered");
            return Outcome::UnsupportedType {
                request_id: request.request_id.clone(),
                request_type: request.request_type.clone(),
            };
        };

        match handler.handle(request) {
            Ok(body) => Outcome::Success(Response::for_request(request, body)),
            Err(e) => Outcome::InvalidRequest {
                request_id: request.request_id.clone(),
                request_type: request.request_type.clone(),
                reason: e.to_string(),
            },
        }
    }
}
