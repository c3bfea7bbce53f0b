#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{test_options, StubWorker};
use lmat::worker::{ExecutableSpawner, WorkerBridge, WorkerError};

#[tokio::test]
async fn test_worker_exits_before_connecting() {
    let spawner = StubWorker::exits_immediately().spawner();

    let err = WorkerBridge::initialize(&spawner, test_options())
        .await
        .unwrap_err();
    assert!(
        matches!(err, WorkerError::ExitedBeforeConnect { code: Some(1) }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_worker_never_connects() {
    let mut options = test_options();
    options.connect_timeout = Some(Duration::from_millis(200));

    let err = WorkerBridge::initialize(&StubWorker::hanging(), options)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::ConnectTimeout(_)), "got {err:?}");
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_missing_executable() {
    let spawner = ExecutableSpawner::new("/nonexistent/lmat/SympyClient-linux.bin");

    let err = WorkerBridge::initialize(&spawner, test_options())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::SpawnFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_each_bridge_gets_its_own_port() {
    let first = common::start(StubWorker::echo()).await;
    let second = common::start(StubWorker::echo()).await;

    assert_ne!(first.port(), second.port());

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
}
