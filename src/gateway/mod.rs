//! Gateway: bridges externally delivered payloads to a worker.
//!
//! Each [`Gateway::handle`] call mints a correlation id, forwards the
//! payload over one bounded rendezvous round trip and relays the worker's
//! reply. Request-received and response-sent events tagged with the id go
//! to the log aggregator.
//!
//! Transport failures never reach the caller as errors. A timed-out or
//! failed round trip is answered with a sanitized plain-text message.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bus::{emit, EventPublisher};
use crate::config::GatewayConfig;
use crate::protocol::{ErrorKind, ErrorReply, LogEvent};
use crate::transport::{Endpoint, Requester, TransportError};

pub mod correlation;
pub mod errmsg;

pub use correlation::{attach_request_id, RequestCounter};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "application/text; charset=utf-8";

/// Reply body relayed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The worker's JSON object, verbatim.
    Structured(String),
    PlainText(String),
}

impl Reply {
    pub fn body(&self) -> &str {
        match self {
            Reply::Structured(body) | Reply::PlainText(body) => body,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Reply::Structured(_) => JSON_CONTENT_TYPE,
            Reply::PlainText(_) => TEXT_CONTENT_TYPE,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Reply::Structured(_))
    }
}

/// How one exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeStatus {
    Ok,
    UnsupportedType(String),
    InvalidRequest(String),
    /// The worker could not decode the payload.
    Malformed,
    /// The worker answered with plain text.
    Unstructured,
    TimedOut,
    Unavailable(String),
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStatus::Ok => write!(f, "ok"),
            ExchangeStatus::UnsupportedType(t) => write!(f, "unsupported request type {}", t),
            ExchangeStatus::InvalidRequest(reason) => write!(f, "invalid request ({})", reason),
            ExchangeStatus::Malformed => write!(f, "malformed payload"),
            ExchangeStatus::Unstructured => write!(f, "plain text"),
            ExchangeStatus::TimedOut => write!(f, "timed out"),
            ExchangeStatus::Unavailable(_) => write!(f, "service unavailable"),
        }
    }
}

/// Result of one [`Gateway::handle`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub request_id: u64,
    /// The payload's `requestType`, or its raw text if it did not decode.
    pub request_type: String,
    pub status: ExchangeStatus,
    pub reply: Reply,
}

/// Correlating bridge to one worker.
pub struct Gateway {
    worker: Endpoint,
    requester: Mutex<Requester>,
    events: Arc<dyn EventPublisher>,
    counter: RequestCounter,
    timeout: Duration,
}

impl Gateway {
    /// Prepare the worker connection and publish connectivity events.
    ///
    /// The worker connection is made on the first request.
    pub async fn connect(config: &GatewayConfig, events: Arc<dyn EventPublisher>) -> Self {
        let requester = Requester::connect(&config.worker_endpoint);

        emit(
            events.as_ref(),
            LogEvent::plain("Gateway connected to log aggregator"),
        )
        .await;
        emit(
            events.as_ref(),
            LogEvent::plain(format!(
                "Gateway connected to worker at {}",
                config.worker_endpoint
            )),
        )
        .await;
        info!(
            worker = %config.worker_endpoint,
            timeout = ?config.request_timeout(),
            "Gateway ready"
        );

        Self {
            worker: config.worker_endpoint.clone(),
            requester: Mutex::new(requester),
            events,
            counter: RequestCounter::new(),
            timeout: config.request_timeout(),
        }
    }

    pub fn worker_endpoint(&self) -> &Endpoint {
        &self.worker
    }

    /// Forward one payload and relay the reply.
    pub async fn handle(&self, raw: &[u8]) -> Exchange {
        let request_id = self.counter.next();

        let (request_type, forward) = match attach_request_id(raw, request_id) {
            Some(tagged) => (tagged.request_type, tagged.payload),
            None => {
                debug!(request_id, "Payload is not a request, forwarding unchanged");
                (String::from_utf8_lossy(raw).into_owned(), raw.to_vec())
            }
        };

        self.publish(LogEvent::correlated(
            request_id.to_string(),
            &request_type,
            "Gateway received request",
        ))
        .await;

        let result = {
            let mut requester = self.requester.lock().await;
            requester.request(&forward, self.timeout).await
        };

        let (status, reply) = match result {
            Ok(bytes) => classify(bytes),
            Err(TransportError::Timeout(after)) => {
                warn!(request_id, timeout = ?after, "Worker did not reply in time");
                (
                    ExchangeStatus::TimedOut,
                    Reply::PlainText(errmsg::SERVICE_TIMED_OUT.to_string()),
                )
            }
            Err(e) => {
                warn!(request_id, error = %e, "Worker round trip failed");
                (
                    ExchangeStatus::Unavailable(e.to_string()),
                    Reply::PlainText(errmsg::SERVICE_UNAVAILABLE.to_string()),
                )
            }
        };

        let sent = match &status {
            ExchangeStatus::Ok => "Gateway sent response".to_string(),
            other => format!("Gateway sent response: {}", other),
        };
        self.publish(LogEvent::correlated(
            request_id.to_string(),
            &request_type,
            sent,
        ))
        .await;

        Exchange {
            request_id,
            request_type,
            status,
            reply,
        }
    }

    /// Publish the closing event and release both connections.
    pub async fn shutdown(self) {
        self.publish(LogEvent::plain("Gateway closing")).await;
        self.requester.into_inner().close().await;
        self.events.close().await;
        info!("Gateway stopped");
    }

    async fn publish(&self, event: LogEvent) {
        emit(self.events.as_ref(), event).await;
    }
}

/// JSON objects are relayed as structured replies; anything else as text.
fn classify(bytes: Vec<u8>) -> (ExchangeStatus, Reply) {
    let text = String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

    if !matches!(serde_json::from_str::<Value>(&text), Ok(Value::Object(_))) {
        return (ExchangeStatus::Unstructured, Reply::PlainText(text));
    }

    let status = match serde_json::from_str::<ErrorReply>(&text) {
        Ok(error) => match error.error {
            ErrorKind::DecodeError => ExchangeStatus::Malformed,
            ErrorKind::UnsupportedRequestType => {
                ExchangeStatus::UnsupportedType(error.request_type.unwrap_or_default())
            }
            ErrorKind::InvalidRequest => ExchangeStatus::InvalidRequest(error.message),
        },
        Err(_) => ExchangeStatus::Ok,
    };
    (status, Reply::Structured(text))
}
