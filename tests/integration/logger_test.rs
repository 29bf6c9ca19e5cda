//! Log aggregator lifecycle: rotation, termination and fatal start-up.

use relaycore::bus::{EventPublisher, TopicPublisher};
use relaycore::config::LoggerConfig;
use relaycore::logger::{LogAggregator, LoggerError};
use relaycore::protocol::control::{ARCHIVE_LOG_FILE, TERMINATE_LOGGER};
use relaycore::transport::{Endpoint, Responder, Subscriber};

use crate::common::{any_port, archives, read_bodies, start_logger, wait_for_bodies, TOPIC};

#[tokio::test]
async fn test_rotation_keeps_every_event() {
    const ROTATIONS: usize = 3;

    let logger = start_logger().await;
    let path = logger.log_file().to_path_buf();
    // One publisher keeps events and commands in order.
    let publisher = TopicPublisher::connect(&logger.config.endpoint, TOPIC);

    for i in 0..ROTATIONS {
        publisher.send_payload(&format!("event-{}", i)).unwrap();
        publisher.send_payload(ARCHIVE_LOG_FILE).unwrap();
    }
    publisher
        .send_payload(&format!("event-{}", ROTATIONS))
        .unwrap();
    publisher.send_payload(TERMINATE_LOGGER).unwrap();
    publisher.close().await;

    let dir = logger.join().await;
    let archived = archives(dir.path(), &path);
    assert_eq!(archived.len(), ROTATIONS);

    let mut seen = Vec::new();
    for archive in &archived {
        let bodies = read_bodies(archive);
        assert!(bodies[0].starts_with("Log file opened: "), "{:?}", bodies);
        assert_eq!(bodies.last().unwrap(), "Received archive command");
        assert_eq!(bodies.len(), 3, "{:?}", bodies);
        seen.push(bodies[1].clone());
    }
    seen.sort();
    assert_eq!(seen, vec!["event-0", "event-1", "event-2"]);

    let active = read_bodies(&path);
    assert!(active[0].starts_with("Log file opened: "));
    assert_eq!(
        active[1..],
        ["event-3", "Received terminate command", "Log aggregator closing"]
    );
}

#[tokio::test]
async fn test_commands_must_match_exactly() {
    let logger = start_logger().await;
    let publisher = TopicPublisher::connect(&logger.config.endpoint, TOPIC);

    publisher.send_payload("please TERMINATE_LOGGER").unwrap();
    publisher.send_payload("ARCHIVE_LOG_FILE now").unwrap();
    publisher.send_payload("still running").unwrap();
    publisher.close().await;

    wait_for_bodies(
        logger.log_file(),
        &["please TERMINATE_LOGGER", "ARCHIVE_LOG_FILE now", "still running"],
    )
    .await;
    assert!(!logger.task.is_finished());
    assert!(archives(logger.dir.path(), logger.log_file()).is_empty());

    logger.task.abort();
}

#[tokio::test]
async fn test_structured_events_use_sentinels() {
    let logger = start_logger().await;
    let publisher = TopicPublisher::connect(&logger.config.endpoint, TOPIC);

    publisher.send_payload(r#"{"message":"no ids"}"#).unwrap();
    publisher.send_payload(r#"{"requestId":"9"}"#).unwrap();
    publisher.close().await;

    wait_for_bodies(
        logger.log_file(),
        &[
            "0:REQUEST_TYPE_MISSING:no ids",
            "9:REQUEST_TYPE_MISSING:MESSAGE_MISSING",
        ],
    )
    .await;
    logger.task.abort();
}

#[tokio::test]
async fn test_unopenable_log_file_is_fatal_and_binds_nothing() {
    // Find a free port, then release it.
    let probe = Subscriber::bind(&any_port(), TOPIC).await.unwrap();
    let port = probe.endpoint().port();
    probe.close().await;

    let dir = tempfile::tempdir().unwrap();
    let config = LoggerConfig {
        endpoint: Endpoint::new("127.0.0.1", port),
        topic: TOPIC.to_string(),
        file: dir.path().join("no-such-dir").join("project.log"),
    };

    let err = LogAggregator::start(&config).await.err().unwrap();
    assert!(matches!(err, LoggerError::Open { .. }));

    // The endpoint is still free.
    let responder = Responder::bind(&config.endpoint).await.unwrap();
    responder.close().await;
}
