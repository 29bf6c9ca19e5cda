//! relay-gateway: Line-oriented gateway
//!
//! Reads one payload per stdin line, forwards it to the worker with a fresh
//! correlation id and prints the reply body on stdout. Shuts down on EOF.
//!
//! ## Architecture
//! ```text
//! stdin --> [relay-gateway] --(rendezvous)--> [relay-worker]
//!                 |                                 |
//!                 +-------(topic fan-out)-----> [relay-logger]
//! ```
//!
//! ## Configuration
//! - RELAYCORE__GATEWAY__WORKER_ENDPOINT: Worker to call (default: tcp://127.0.0.1:5557)
//! - RELAYCORE__GATEWAY__REQUEST_TIMEOUT_MS: Round-trip bound (default: 5000)
//! - RELAYCORE__LOGGER__ENDPOINT / RELAYCORE__LOGGER__TOPIC: Where events go

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use relaycore::bus::{EventPublisher, TopicPublisher};
use relaycore::config::Config;
use relaycore::gateway::Gateway;
use relaycore::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Line-oriented gateway to a worker service", long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let events: Arc<dyn EventPublisher> = Arc::new(TopicPublisher::connect(
        &config.logger.endpoint,
        &config.logger.topic,
    ));
    let gateway = Gateway::connect(&config.gateway, events).await;
    info!(worker = %gateway.worker_endpoint(), "relay-gateway started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let exchange = gateway.handle(line.as_bytes()).await;
        debug!(
            request_id = exchange.request_id,
            status = %exchange.status,
            content_type = exchange.reply.content_type(),
            "Exchange complete"
        );

        stdout.write_all(exchange.reply.body().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    gateway.shutdown().await;
    Ok(())
}
