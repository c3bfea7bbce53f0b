#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{start, start_with, test_options, Reply, StubWorker};
use lmat::environment::Environment;
use lmat::worker::protocol::{kinds, ExpressionPayload, ResponseStatus};
use lmat::worker::{FailureKind, ShutdownOutcome, WorkerError};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn expression(text: &str) -> ExpressionPayload {
    ExpressionPayload::new(text, Environment::default())
}

#[tokio::test]
async fn test_round_trip() {
    let bridge = start(StubWorker::echo()).await;
    assert!(bridge.is_alive());
    assert_ne!(bridge.port(), 0);

    let response = bridge
        .evaluate(kinds::EVALUATE, &expression("x + 1"))
        .await
        .unwrap();

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.result_text(), Some("x + 1"));
    assert_eq!(bridge.pending_requests().await, 0);

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_responses_are_routed_by_id() {
    // Answers are held until all three requests arrived, then sent in
    // reverse order.
    let bridge = start(StubWorker::echo().batched(3)).await;

    let (a, b, c) = tokio::join!(
        bridge.send(kinds::EVALUATE, expression("a")),
        bridge.send(kinds::EVALUATE, expression("b")),
        bridge.send(kinds::EVALUATE, expression("c")),
    );

    assert_eq!(a.unwrap().result_text(), Some("a"));
    assert_eq!(b.unwrap().result_text(), Some("b"));
    assert_eq!(c.unwrap().result_text(), Some("c"));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_carries_type_and_payload() {
    let worker = StubWorker::new(|request| {
        Reply::Success(json!({
            "result": format!(
                "{}:{}",
                request["type"].as_str().unwrap_or(""),
                request["payload"]["target_units"][0].as_str().unwrap_or("")
            )
        }))
    });
    let bridge = start(worker).await;

    let mut payload = expression("3 km");
    payload.target_units = Some(vec!["m".to_string()]);
    let response = bridge.send(kinds::CONVERT_UNITS, &payload).await.unwrap();

    assert_eq!(response.result_text(), Some("convert-units:m"));
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_error_response_rejects_and_notifies_observers() {
    let bridge = start(StubWorker::new(|_| Reply::Error("bad latex".to_string()))).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bridge.on_error(move |failure| sink.lock().unwrap().push(failure.message.clone()));
    let mut events = bridge.subscribe_errors();

    let err = bridge
        .send(kinds::EVALUATE, expression("\\frac{"))
        .await
        .unwrap_err();
    assert!(matches!(&err, WorkerError::Remote { message } if message == "bad latex"));

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, FailureKind::Remote);
    assert!(event.correlation_id.is_some());
    assert_eq!(*seen.lock().unwrap(), vec!["bad latex".to_string()]);

    // The bridge stays usable after a remote error.
    assert!(bridge.is_alive());
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_crash_rejects_pending_requests() {
    let worker = StubWorker::new(|request| match request["type"].as_str() {
        Some("evaluate") => Reply::Silent,
        _ => Reply::Crash,
    });
    let bridge = start(worker).await;
    let mut events = bridge.subscribe_errors();

    // One request left waiting, another that makes the worker crash.
    let (waiting, crashing) = tokio::join!(
        bridge.send(kinds::EVALUATE, expression("x")),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            bridge.send(kinds::SOLVE, expression("y")).await
        }
    );

    let waiting = waiting.unwrap_err();
    assert!(waiting.is_connection_lost(), "got {waiting:?}");
    assert!(crashing.unwrap_err().is_connection_lost());

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, FailureKind::Transport);

    tokio::time::timeout(Duration::from_secs(2), async {
        while bridge.is_alive() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("bridge still alive after the worker crashed");

    let err = bridge
        .send(kinds::EVALUATE, expression("z"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NotConnected));
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let bridge = start(StubWorker::echo()).await;

    let outcome = bridge.shutdown().await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert!(!bridge.is_alive());

    let err = bridge
        .send(kinds::EVALUATE, expression("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NotConnected));
    assert!(matches!(
        bridge.shutdown().await,
        Err(WorkerError::NotConnected)
    ));
}

#[tokio::test]
async fn test_shutdown_kills_unresponsive_worker() {
    let bridge = start(StubWorker::echo().ignoring_exit()).await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), bridge.shutdown())
        .await
        .expect("shutdown must be bounded")
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Forced);
}

#[tokio::test]
async fn test_request_timeout_cleans_up() {
    let mut options = test_options();
    options.request_timeout = Some(Duration::from_millis(100));
    let bridge = start_with(StubWorker::new(|_| Reply::Silent), options).await;

    let err = bridge
        .send(kinds::EVALUATE, expression("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Timeout(_)));
    assert!(err.is_retriable());
    assert_eq!(bridge.pending_requests().await, 0);

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_request_cleans_up() {
    let bridge = start(StubWorker::new(|_| Reply::Silent)).await;
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = bridge
        .send_with_cancel(kinds::EVALUATE, expression("x"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Cancelled));
    assert_eq!(bridge.pending_requests().await, 0);

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_exit_is_reserved() {
    let bridge = start(StubWorker::echo()).await;

    let err = bridge.send(kinds::EXIT, json!({})).await.unwrap_err();
    assert!(matches!(err, WorkerError::ReservedKind(_)));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_payload_must_be_an_object() {
    let bridge = start(StubWorker::echo()).await;

    let err = bridge.send(kinds::EVALUATE, "x + 1").await.unwrap_err();
    assert!(matches!(err, WorkerError::SerializeFailed(_)));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_and_legacy_frames() {
    // Garbage is dropped; `uid`/`response` are accepted for the id and result.
    let worker = StubWorker::new(|request| {
        let legacy = json!({
            "status": "result",
            "uid": request["correlation_id"],
            "response": { "result": "4", "metadata": { "end_line": 2 }, "status": "success" }
        });
        Reply::Frames(vec!["not json".to_string(), legacy.to_string()])
    });
    let bridge = start(worker).await;

    let response = bridge
        .send(kinds::EVALUATE, expression("2 + 2"))
        .await
        .unwrap();
    assert_eq!(response.effective_status(), ResponseStatus::Success);
    assert_eq!(response.result_text(), Some("4"));
    assert_eq!(response.metadata().end_line, Some(2));

    bridge.shutdown().await.unwrap();
}
