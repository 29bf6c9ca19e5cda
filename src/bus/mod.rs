//! Audit event publishing.
//!
//! This module contains:
//! - `EventPublisher` trait: hands [`LogEvent`]s to the log aggregator
//! - `TopicPublisher`: fan-out implementation with topic envelopes
//! - `MockEventPublisher`: in-memory recorder for tests
//!
//! Publishing is fire-and-forget. A component's request path never waits for
//! the aggregator to record an event.

use async_trait::async_trait;
use tracing::warn;

use crate::protocol::LogEvent;
use crate::transport::{Endpoint, Publisher, TransportError};

pub mod mock;

pub use mock::MockEventPublisher;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur while publishing.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Publish failed: {0}")]
    Publish(#[from] TransportError),

    #[error("Publisher is closed")]
    Closed,
}

/// Interface for delivering audit events to the log aggregator.
///
/// Implementations:
/// - `TopicPublisher`: fan-out socket with `<topic> <payload>` envelopes
/// - `MockEventPublisher`: in-memory mock for testing
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Queue one event. Returns before the aggregator has seen it.
    async fn publish(&self, event: LogEvent) -> Result<()>;

    /// Drain queued events and disconnect. Later publishes fail.
    async fn close(&self);
}

/// Publish `event`, reporting failure through tracing only.
pub async fn emit(publisher: &dyn EventPublisher, event: LogEvent) {
    if let Err(e) = publisher.publish(event).await {
        warn!(error = %e, "Audit event dropped");
    }
}

/// `<topic> <payload>`.
pub fn envelope(topic: &str, payload: &str) -> String {
    format!("{} {}", topic, payload)
}

/// Fan-out publisher that wraps every payload in a topic envelope.
pub struct TopicPublisher {
    publisher: Publisher,
    topic: String,
}

impl TopicPublisher {
    pub fn connect(endpoint: &Endpoint, topic: impl Into<String>) -> Self {
        Self {
            publisher: Publisher::connect(endpoint),
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn envelope(&self, payload: &str) -> String {
        envelope(&self.topic, payload)
    }

    /// Publish a raw payload, such as a control command.
    pub fn send_payload(&self, payload: &str) -> Result<()> {
        self.publisher.send(self.envelope(payload))?;
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for TopicPublisher {
    async fn publish(&self, event: LogEvent) -> Result<()> {
        self.send_payload(&event.to_payload())
    }

    async fn close(&self) {
        self.publisher.close().await;
    }
}
