//! Worker services.
//!
//! A [`WorkerService`] binds a [`Responder`] and answers one request at a
//! time from a [`HandlerRegistry`]. Every payload it reads gets exactly one
//! reply, except after the terminate command, when it stops reading.
//!
//! Audit events go to the log aggregator through an [`EventPublisher`]:
//! a start event, a request-received/response-sent pair per request, and
//! terminate and closing events on shutdown.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::bus::{emit, EventPublisher};
use crate::config::WorkerConfig;
use crate::protocol::control::{is_terminate, terminate_command};
use crate::protocol::{LogEvent, Outcome, Request};
use crate::transport::{Endpoint, ReplyHandle, Responder, TransportError};

pub mod hello;
pub mod registry;

pub use hello::{hello_registry, HELLO_SERVICE_NAME};
pub use registry::{HandlerError, HandlerRegistry, RequestHandler};

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that prevent a worker from serving.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Lifecycle of a worker. There is no way back from `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Listening,
    Terminated,
}

/// A bound worker, ready to [`run`](WorkerService::run).
pub struct WorkerService {
    name: String,
    terminate_command: String,
    responder: Responder,
    events: Arc<dyn EventPublisher>,
    registry: HandlerRegistry,
    state: ServiceState,
}

impl WorkerService {
    /// Bind the worker's endpoint and publish its start event.
    pub async fn start(
        config: &WorkerConfig,
        events: Arc<dyn EventPublisher>,
        registry: HandlerRegistry,
    ) -> Result<Self> {
        let responder = Responder::bind(&config.endpoint).await?;
        let terminate_command = terminate_command(&config.name);

        emit(
            events.as_ref(),
            LogEvent::plain(format!("{} started", config.name)),
        )
        .await;
        info!(
            service = %config.name,
            endpoint = %responder.endpoint(),
            request_types = ?registry.request_types(),
            terminate = %terminate_command,
            "Worker listening"
        );

        Ok(Self {
            name: config.name.clone(),
            terminate_command,
            responder,
            events,
            registry,
            state: ServiceState::Listening,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint requesters connect to.
    pub fn endpoint(&self) -> &Endpoint {
        self.responder.endpoint()
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Serve requests until the terminate command arrives, then shut down.
    pub async fn run(mut self) -> ServiceState {
        while self.state == ServiceState::Listening {
            let incoming = match self.responder.recv().await {
                Ok(incoming) => incoming,
                Err(e) => {
                    warn!(service = %self.name, error = %e, "Responder stopped");
                    break;
                }
            };
            let (payload, reply) = incoming.into_parts();

            if is_terminate(&payload, &self.terminate_command) {
                self.publish(LogEvent::plain(format!(
                    "{} received terminate command",
                    self.name
                )))
                .await;
                if let Err(e) = reply.send(format!("{} being terminated", self.name)) {
                    warn!(service = %self.name, error = %e, "Terminate acknowledgement not delivered");
                }
                self.state = ServiceState::Terminated;
            } else {
                self.serve(&payload, reply).await;
            }
        }

        self.shutdown().await
    }

    async fn serve(&self, payload: &[u8], reply: ReplyHandle) {
        let request = match Request::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                let raw = String::from_utf8_lossy(payload).into_owned();
                debug!(service = %self.name, error = %e, "Malformed payload");
                self.publish(LogEvent::plain(format!(
                    "{} received malformed payload: {}",
                    self.name, raw
                )))
                .await;
                answer(reply, &Outcome::DecodeError { raw });
                return;
            }
        };

        let handler = self.registry.get(&request.request_type);
        let received = match handler.and_then(|h| h.describe(&request)) {
            Some(detail) => format!("{} received request: {}", self.name, detail),
            None => format!("{} received request", self.name),
        };
        self.publish(LogEvent::correlated(
            &request.request_id,
            &request.request_type,
            received,
        ))
        .await;

        let outcome = self.registry.dispatch(&request);
        answer(reply, &outcome);

        let sent = match response_detail(handler, &outcome) {
            Some(detail) => format!("{} sent response: {}", self.name, detail),
            None => format!("{} sent response", self.name),
        };
        self.publish(LogEvent::correlated(
            &request.request_id,
            &request.request_type,
            sent,
        ))
        .await;
    }

    async fn shutdown(self) -> ServiceState {
        self.publish(LogEvent::plain(format!("{} closing", self.name)))
            .await;
        self.responder.close().await;
        self.events.close().await;
        info!(service = %self.name, "Worker terminated");
        ServiceState::Terminated
    }

    async fn publish(&self, event: LogEvent) {
        emit(self.events.as_ref(), event).await;
    }
}

fn answer(reply: ReplyHandle, outcome: &Outcome) {
    match outcome.to_wire() {
        Ok(wire) => {
            if let Err(e) = reply.send(wire) {
                warn!(error = %e, request_id = ?outcome.request_id(), "Requester gone before reply");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode reply"),
    }
}

fn response_detail(handler: Option<&dyn RequestHandler>, outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Success(response) => handler.and_then(|h| h.summarize(&response.body)),
        Outcome::UnsupportedType { .. } => Some("unsupported request type".to_string()),
        Outcome::InvalidRequest { reason, .. } => Some(format!("invalid request ({})", reason)),
        Outcome::DecodeError { .. } => Some("malformed payload".to_string()),
    }
}
