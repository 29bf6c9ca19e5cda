//! relay-control: Operator commands
//!
//! - `logger archive`: rotate the aggregator's log file
//! - `logger terminate`: stop the aggregator
//! - `worker terminate`: stop a worker and print its acknowledgement
//!
//! Endpoints, topic and worker name come from the same configuration as the
//! components themselves.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use relaycore::config::Config;
use relaycore::control::{send_logger_command, terminate_worker};
use relaycore::protocol::control::LoggerCommand;
use relaycore::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Send control commands to relaycore components", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log aggregator commands
    Logger {
        #[command(subcommand)]
        command: LoggerCommands,
    },

    /// Worker service commands
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
}

#[derive(Subcommand)]
enum LoggerCommands {
    /// Rotate the log file
    Archive,
    /// Stop the aggregator
    Terminate,
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Stop the worker
    Terminate {
        /// Worker display name (defaults to the configured name)
        #[arg(long)]
        name: Option<String>,

        /// How long to wait for the acknowledgement
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    match cli.command {
        Commands::Logger { command } => {
            let command = match command {
                LoggerCommands::Archive => LoggerCommand::Archive,
                LoggerCommands::Terminate => LoggerCommand::Terminate,
            };
            send_logger_command(&config.logger.endpoint, &config.logger.topic, command).await?;
        }
        Commands::Worker {
            command: WorkerCommands::Terminate { name, timeout_ms },
        } => {
            let name = name.unwrap_or(config.worker.name);
            let ack = terminate_worker(
                &config.worker.endpoint,
                &name,
                Duration::from_millis(timeout_ms),
            )
            .await?;
            println!("{}", ack);
        }
    }

    Ok(())
}
