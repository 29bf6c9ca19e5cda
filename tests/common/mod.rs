//! Shared utilities for integration tests.
//!
//! Starts components on ephemeral ports and reads back the audit log.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use relaycore::bus::{EventPublisher, TopicPublisher};
use relaycore::config::{GatewayConfig, LoggerConfig, WorkerConfig};
use relaycore::gateway::Gateway;
use relaycore::logger::{LogAggregator, LoggerError};
use relaycore::services::{hello_registry, ServiceState, WorkerService, HELLO_SERVICE_NAME};
use relaycore::transport::Endpoint;

pub const TOPIC: &str = "Project_Log";

/// How long log assertions wait for events to settle.
pub const SETTLE: Duration = Duration::from_secs(5);

/// Width of the `<timestamp>:` line prefix.
const TIMESTAMP_PREFIX_LEN: usize = 24;

pub fn any_port() -> Endpoint {
    Endpoint::new("127.0.0.1", 0)
}

/// A running log aggregator writing into a temporary directory.
pub struct RunningLogger {
    pub dir: TempDir,
    /// Config with the bound endpoint filled in.
    pub config: LoggerConfig,
    pub task: JoinHandle<Result<(), LoggerError>>,
}

impl RunningLogger {
    pub fn log_file(&self) -> &Path {
        &self.config.file
    }

    pub fn publisher(&self) -> Arc<dyn EventPublisher> {
        Arc::new(TopicPublisher::connect(&self.config.endpoint, TOPIC))
    }

    /// Wait for the aggregator to stop after `TERMINATE_LOGGER`.
    pub async fn join(self) -> TempDir {
        tokio::time::timeout(SETTLE, self.task)
            .await
            .expect("logger stops in time")
            .expect("logger task")
            .expect("logger run");
        self.dir
    }
}

pub async fn start_logger() -> RunningLogger {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LoggerConfig {
        endpoint: any_port(),
        topic: TOPIC.to_string(),
        file: dir.path().join("project.log"),
    };

    let aggregator = LogAggregator::start(&config).await.unwrap();
    config.endpoint = aggregator.endpoint().clone();
    let task = tokio::spawn(aggregator.run());

    RunningLogger { dir, config, task }
}

/// A running hello worker.
pub struct RunningWorker {
    pub endpoint: Endpoint,
    pub task: JoinHandle<ServiceState>,
}

pub async fn start_worker(logger: &RunningLogger) -> RunningWorker {
    let config = WorkerConfig {
        endpoint: any_port(),
        name: HELLO_SERVICE_NAME.to_string(),
    };
    let worker = WorkerService::start(&config, logger.publisher(), hello_registry())
        .await
        .unwrap();
    let endpoint = worker.endpoint().clone();
    let task = tokio::spawn(worker.run());

    RunningWorker { endpoint, task }
}

pub async fn start_gateway(
    logger: &RunningLogger,
    worker_endpoint: &Endpoint,
    timeout: Duration,
) -> Gateway {
    let config = GatewayConfig {
        worker_endpoint: worker_endpoint.clone(),
        request_timeout_ms: timeout.as_millis() as u64,
    };
    Gateway::connect(&config, logger.publisher()).await
}

/// Log lines with the timestamp prefix removed.
pub fn read_bodies(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| line.get(TIMESTAMP_PREFIX_LEN..).unwrap_or_default().to_string())
        .collect()
}

/// Poll the log until every expected body is present, then return all
/// bodies. Panics after [`SETTLE`].
pub async fn wait_for_bodies(path: &Path, expected: &[&str]) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + SETTLE;
    loop {
        let bodies = read_bodies(path);
        if expected.iter().all(|e| bodies.iter().any(|b| b == e)) {
            return bodies;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("log never contained {:?}; got {:#?}", expected, bodies);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Index of `body` in `bodies`. Panics if absent.
pub fn position(bodies: &[String], body: &str) -> usize {
    bodies
        .iter()
        .position(|b| b == body)
        .unwrap_or_else(|| panic!("{:?} not in log {:#?}", body, bodies))
}

/// Every file in `dir` other than `active`, sorted by name.
pub fn archives(dir: &Path, active: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path != active)
        .collect();
    files.sort();
    files
}
