//! Mock event publisher for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BusError, EventPublisher, Result};
use crate::protocol::LogEvent;
use crate::transport::TransportError;

/// Records published events in memory.
#[derive(Default)]
pub struct MockEventPublisher {
    published: RwLock<Vec<LogEvent>>,
    fail_on_publish: RwLock<bool>,
    closed: RwLock<bool>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn published(&self) -> Vec<LogEvent> {
        self.published.read().await.clone()
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: LogEvent) -> Result<()> {
        if *self.closed.read().await {
            return Err(BusError::Closed);
        }
        if *self.fail_on_publish.read().await {
            return Err(BusError::Publish(TransportError::ConnectionClosed));
        }
        self.published.write().await.push(event);
        Ok(())
    }

    async fn close(&self) {
        *self.closed.write().await = true;
    }
}
