//! Operator commands for running components.

use std::time::Duration;

use tracing::info;

use crate::bus::envelope;
use crate::protocol::control::{terminate_command, LoggerCommand};
use crate::transport::{Endpoint, Publisher, Requester, Result};

/// Deliver `ARCHIVE_LOG_FILE` or `TERMINATE_LOGGER` to the log aggregator.
pub async fn send_logger_command(
    endpoint: &Endpoint,
    topic: &str,
    command: LoggerCommand,
) -> Result<()> {
    Publisher::send_once(endpoint, envelope(topic, command.as_str()).as_bytes()).await?;
    info!(endpoint = %endpoint, command = command.as_str(), "Logger command sent");
    Ok(())
}

/// Send a worker its terminate command and return the acknowledgement.
pub async fn terminate_worker(
    endpoint: &Endpoint,
    service_name: &str,
    timeout: Duration,
) -> Result<String> {
    let command = terminate_command(service_name);
    let mut requester = Requester::connect(endpoint);
    let reply = requester.request(command.as_bytes(), timeout).await?;
    requester.close().await;

    info!(endpoint = %endpoint, command = %command, "Worker terminated");
    Ok(String::from_utf8_lossy(&reply).into_owned())
}
