//! relay-logger: Log aggregator
//!
//! Binds the fan-out endpoint and appends every event published on the
//! configured topic to the log file, one timestamped line per event.
//!
//! ## Architecture
//! ```text
//! [relay-worker]  --\
//!                    +--(topic fan-out)--> [relay-logger] --> project.log
//! [relay-gateway] --/
//! ```
//!
//! ## Configuration
//! - RELAYCORE__LOGGER__ENDPOINT: Endpoint to bind (default: tcp://127.0.0.1:5556)
//! - RELAYCORE__LOGGER__TOPIC: Topic filter (default: Project_Log)
//! - RELAYCORE__LOGGER__FILE: Active log file (default: /var/log/relaycore/project.log)
//!
//! Send `ARCHIVE_LOG_FILE` to rotate the file and `TERMINATE_LOGGER` to stop
//! (see `relay-control`).

use clap::Parser;
use tracing::{error, info};

use relaycore::config::Config;
use relaycore::logger::LogAggregator;
use relaycore::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Topic-filtered log aggregator", long_about = None)]
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

    let aggregator = LogAggregator::start(&config.logger).await.map_err(|e| {
        error!(error = %e, "Log aggregator failed to start");
        e
    })?;
    info!(endpoint = %aggregator.endpoint(), "relay-logger started");

    aggregator.run().await?;
    Ok(())
}
