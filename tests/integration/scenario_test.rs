//! End-to-end request scenario: gateway -> worker -> log aggregator.

use std::time::Duration;

use relaycore::control::{send_logger_command, terminate_worker};
use relaycore::gateway::{ExchangeStatus, Reply};
use relaycore::protocol::control::LoggerCommand;
use relaycore::services::ServiceState;

use crate::common::{position, start_gateway, start_logger, start_worker, wait_for_bodies, TOPIC};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_say_hello_is_correlated_through_the_log() {
    let logger = start_logger().await;
    let worker = start_worker(&logger).await;
    let gateway = start_gateway(&logger, &worker.endpoint, TIMEOUT).await;

    let exchange = gateway
        .handle(br#"{"requestType":"sayHello","name":"Tess"}"#)
        .await;
    assert_eq!(exchange.request_id, 1);
    assert_eq!(exchange.status, ExchangeStatus::Ok);
    assert_eq!(
        exchange.reply,
        Reply::Structured(r#"{"requestId":"1","requestType":"sayHello","response":"Hello Tess"}"#.into())
    );

    let opened = format!("Log file opened: {}", logger.log_file().display());
    let expected = [
        opened.as_str(),
        "HelloService started",
        "1:sayHello:Gateway received request",
        "1:sayHello:HelloService received request: Tess",
        "1:sayHello:HelloService sent response: Hello Tess",
        "1:sayHello:Gateway sent response",
    ];
    let bodies = wait_for_bodies(logger.log_file(), &expected).await;

    // Each request produces exactly one event of each kind.
    for body in &expected[2..] {
        assert_eq!(bodies.iter().filter(|b| b == body).count(), 1, "{}", body);
    }

    // Order holds per publisher; the aggregator's own event is first.
    // Events from different publishers may interleave (see DESIGN.md, event ordering).
    assert_eq!(position(&bodies, &opened), 0);
    assert!(position(&bodies, expected[1]) < position(&bodies, expected[3]));
    assert!(position(&bodies, expected[3]) < position(&bodies, expected[4]));
    assert!(position(&bodies, expected[2]) < position(&bodies, expected[5]));

    gateway.shutdown().await;
    let ack = terminate_worker(&worker.endpoint, "HelloService", TIMEOUT)
        .await
        .unwrap();
    assert_eq!(ack, "HelloService being terminated");
    assert_eq!(worker.task.await.unwrap(), ServiceState::Terminated);

    wait_for_bodies(logger.log_file(), &["HelloService closing", "Gateway closing"]).await;
    send_logger_command(&logger.config.endpoint, TOPIC, LoggerCommand::Terminate)
        .await
        .unwrap();
    let path = logger.config.file.clone();
    let _dir = logger.join().await;

    let bodies = crate::common::read_bodies(&path);
    assert_eq!(
        &bodies[bodies.len() - 2..],
        ["Received terminate command", "Log aggregator closing"]
    );
}

#[tokio::test]
async fn test_send_html_returns_structured_form() {
    let logger = start_logger().await;
    let worker = start_worker(&logger).await;
    let gateway = start_gateway(&logger, &worker.endpoint, TIMEOUT).await;

    let exchange = gateway.handle(br#"{"requestType":"sendHTML"}"#).await;
    assert_eq!(exchange.status, ExchangeStatus::Ok);
    assert_eq!(exchange.reply.content_type(), "application/json; charset=utf-8");

    let body: serde_json::Value = serde_json::from_str(exchange.reply.body()).unwrap();
    assert_eq!(body["requestId"], "1");
    assert_eq!(body["requestType"], "sendHTML");
    assert!(body["html"].as_str().unwrap().contains("<form"));
    assert!(body["script"].as_str().unwrap().contains("function"));

    wait_for_bodies(
        logger.log_file(),
        &[
            "1:sendHTML:HelloService received request",
            "1:sendHTML:HelloService sent response",
        ],
    )
    .await;

    gateway.shutdown().await;
    terminate_worker(&worker.endpoint, "HelloService", TIMEOUT)
        .await
        .unwrap();
    worker.task.await.unwrap();
    logger.task.abort();
}

#[tokio::test]
async fn test_gateway_relays_terminate_acknowledgement_as_text() {
    let logger = start_logger().await;
    let worker = start_worker(&logger).await;
    let gateway = start_gateway(&logger, &worker.endpoint, TIMEOUT).await;

    let exchange = gateway.handle(b"TERMINATE_HELLO_SERVICE").await;
    assert_eq!(exchange.status, ExchangeStatus::Unstructured);
    assert_eq!(
        exchange.reply,
        Reply::PlainText("HelloService being terminated".into())
    );
    assert_eq!(exchange.reply.content_type(), "application/text; charset=utf-8");
    assert_eq!(worker.task.await.unwrap(), ServiceState::Terminated);

    gateway.shutdown().await;
    logger.task.abort();
}
