//! Gateway correlation and failure replies against real sockets.

use std::time::Duration;

use relaycore::gateway::{ExchangeStatus, Reply};
use relaycore::logger::format::TIMESTAMP_FORMAT;
use relaycore::transport::{Endpoint, Responder};

use crate::common::{start_gateway, start_logger, start_worker, wait_for_bodies};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_ids_increase_across_good_and_bad_payloads() {
    let logger = start_logger().await;
    let worker = start_worker(&logger).await;
    let gateway = start_gateway(&logger, &worker.endpoint, TIMEOUT).await;

    let payloads: [&[u8]; 4] = [
        br#"{"requestType":"sayHello","name":"Ada"}"#,
        b"garbage",
        br#"{"requestType":"teleport"}"#,
        br#"{"requestId":"77","requestType":"sayHello","name":"Bob"}"#,
    ];
    let mut exchanges = Vec::new();
    for payload in payloads {
        exchanges.push(gateway.handle(payload).await);
    }

    let ids: Vec<u64> = exchanges.iter().map(|e| e.request_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(exchanges[0].status, ExchangeStatus::Ok);
    assert_eq!(exchanges[1].status, ExchangeStatus::Malformed);
    assert_eq!(
        exchanges[2].status,
        ExchangeStatus::UnsupportedType("teleport".into())
    );
    // Caller-supplied ids are replaced.
    let body: serde_json::Value = serde_json::from_str(exchanges[3].reply.body()).unwrap();
    assert_eq!(body["requestId"], "4");
    assert_eq!(body["response"], "Hello Bob");

    wait_for_bodies(
        logger.log_file(),
        &[
            "1:sayHello:Gateway received request",
            "2:garbage:Gateway received request",
            "2:garbage:Gateway sent response: malformed payload",
            "3:teleport:Gateway sent response: unsupported request type teleport",
            "4:sayHello:HelloService sent response: Hello Bob",
        ],
    )
    .await;

    gateway.shutdown().await;
    relaycore::control::terminate_worker(&worker.endpoint, "HelloService", TIMEOUT)
        .await
        .unwrap();
    worker.task.await.unwrap();
    logger.task.abort();
}

#[tokio::test]
async fn test_stalled_worker_times_out_with_plain_text() {
    let logger = start_logger().await;
    let mut stalled = Responder::bind(&Endpoint::new("127.0.0.1", 0)).await.unwrap();
    let gateway = start_gateway(&logger, stalled.endpoint(), Duration::from_millis(300)).await;

    let held = tokio::spawn(async move {
        // Accept the request and never answer it.
        let incoming = stalled.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(incoming);
        stalled.close().await;
    });

    let exchange = gateway
        .handle(br#"{"requestType":"sayHello","name":"Ada"}"#)
        .await;
    assert_eq!(exchange.status, ExchangeStatus::TimedOut);
    assert_eq!(exchange.reply, Reply::PlainText("Service timed out".into()));
    assert!(!exchange.reply.is_structured());

    wait_for_bodies(
        logger.log_file(),
        &["1:sayHello:Gateway sent response: timed out"],
    )
    .await;

    gateway.shutdown().await;
    held.await.unwrap();
    logger.task.abort();
}

#[tokio::test]
async fn test_multi_line_payload_keeps_one_event_per_line() {
    let logger = start_logger().await;
    let worker = start_worker(&logger).await;
    let gateway = start_gateway(&logger, &worker.endpoint, TIMEOUT).await;

    let exchange = gateway.handle(b"line one\nline two").await;
    assert_eq!(exchange.status, ExchangeStatus::Malformed);

    wait_for_bodies(
        logger.log_file(),
        &[
            "1:line one\\nline two:Gateway received request",
            "HelloService received malformed payload: line one\\nline two",
            "1:line one\\nline two:Gateway sent response: malformed payload",
        ],
    )
    .await;

    let text = std::fs::read_to_string(logger.log_file()).unwrap();
    for line in text.lines() {
        let stamp = line.get(..23).unwrap_or_default();
        assert!(
            chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok(),
            "line without timestamp: {:?}",
            line
        );
    }

    gateway.shutdown().await;
    relaycore::control::terminate_worker(&worker.endpoint, "HelloService", TIMEOUT)
        .await
        .unwrap();
    worker.task.await.unwrap();
    logger.task.abort();
}
