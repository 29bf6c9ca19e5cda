//! relay-worker: Hello worker service
//!
//! Answers `sayHello` and `sendHTML` requests on a rendezvous endpoint and
//! publishes audit events to the log aggregator.
//!
//! ## Configuration
//! - RELAYCORE__WORKER__ENDPOINT: Endpoint to bind (default: tcp://127.0.0.1:5557)
//! - RELAYCORE__WORKER__NAME: Display name (default: HelloService)
//! - RELAYCORE__LOGGER__ENDPOINT / RELAYCORE__LOGGER__TOPIC: Where events go
//!
//! Stops after receiving `TERMINATE_<NAME>` (e.g. `TERMINATE_HELLO_SERVICE`).

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use relaycore::bus::{EventPublisher, TopicPublisher};
use relaycore::config::Config;
use relaycore::services::{hello_registry, WorkerService};
use relaycore::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Hello worker service", long_about = None)]
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

    let worker = match WorkerService::start(&config.worker, events.clone(), hello_registry()).await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = %e, "Worker failed to start");
            events.close().await;
            return Err(e.into());
        }
    };
    info!(service = %worker.name(), endpoint = %worker.endpoint(), "relay-worker started");

    worker.run().await;
    Ok(())
}
