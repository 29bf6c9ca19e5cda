//! Topic-filtered log aggregator.
//!
//! Binds a [`Subscriber`] on one topic and appends every received event to a
//! flat text file, one timestamped line per event. The file's line order is
//! the order events reached the aggregator.
//!
//! Two commands arrive in-band on the same topic: `ARCHIVE_LOG_FILE` rotates
//! the file and `TERMINATE_LOGGER` ends the aggregator for good.

use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::LoggerConfig;
use crate::protocol::control::LoggerCommand;
use crate::protocol::LogEvent;
use crate::transport::{Endpoint, Subscriber, TransportError};

pub mod format;
pub mod log_file;

pub use log_file::LogFile;

/// Result type for aggregator operations.
pub type Result<T> = std::result::Result<T, LoggerError>;

/// Errors that stop the aggregator.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Cannot open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write log file: {0}")]
    Write(#[source] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A started aggregator, ready to [`run`](LogAggregator::run).
pub struct LogAggregator {
    subscriber: Subscriber,
    topic: String,
    file: LogFile,
}

impl LogAggregator {
    /// Open the log file, record that it was opened, then bind the
    /// subscriber.
    ///
    /// If the file cannot be opened nothing is bound.
    pub async fn start(config: &LoggerConfig) -> Result<Self> {
        let mut file = LogFile::open(&config.file).await?;
        let opened = opened_event(&file);
        record(&mut file, &opened).await;

        let subscriber = Subscriber::bind(&config.endpoint, &config.topic).await?;
        info!(
            endpoint = %subscriber.endpoint(),
            topic = %config.topic,
            file = %config.file.display(),
            "Log aggregator started"
        );

        Ok(Self {
            subscriber,
            topic: config.topic.clone(),
            file,
        })
    }

    /// The endpoint publishers connect to.
    pub fn endpoint(&self) -> &Endpoint {
        self.subscriber.endpoint()
    }

    /// Receive and record events until `TERMINATE_LOGGER`.
    ///
    /// Only a failure to reopen the file after rotation ends the loop with an
    /// error; individual write failures are reported and skipped.
    pub async fn run(self) -> Result<()> {
        let Self {
            mut subscriber,
            topic,
            mut file,
        } = self;
        let prefix = format!("{} ", topic);

        loop {
            let frame = match subscriber.recv().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Subscriber stopped");
                    break;
                }
            };
            let text = String::from_utf8_lossy(&frame);
            let payload = text.strip_prefix(prefix.as_str()).unwrap_or(&text);

            match LoggerCommand::parse(payload) {
                Some(LoggerCommand::Archive) => {
                    record(&mut file, &LogEvent::plain("Received archive command")).await;
                    let (reopened, _) = file.rotate(&Local::now()).await?;
                    file = reopened;
                    let opened = opened_event(&file);
                    record(&mut file, &opened).await;
                }
                Some(LoggerCommand::Terminate) => {
                    record(&mut file, &LogEvent::plain("Received terminate command")).await;
                    break;
                }
                None => record(&mut file, &LogEvent::parse(payload)).await,
            }
        }

        record(&mut file, &LogEvent::plain("Log aggregator closing")).await;
        file.close().await;
        subscriber.close().await;
        info!("Log aggregator stopped");
        Ok(())
    }
}

fn opened_event(file: &LogFile) -> LogEvent {
    LogEvent::plain(format!("Log file opened: {}", file.path().display()))
}

async fn record(file: &mut LogFile, event: &LogEvent) {
    let line = format::format_line(&Local::now(), event);
    if let Err(e) = file.append(&line).await {
        error!(error = %e, line = %line, "Failed to record event");
    }
}
