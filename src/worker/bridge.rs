//! Async bridge to the computation worker.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{WorkerError, WorkerResult};
use super::events::{ErrorHub, WorkerFailure};
use super::handshake::{Handshake, WorkerSocket};
use super::pending::PendingTable;
use super::protocol::{
    kinds, ExpressionPayload, ResponseStatus, SolvePayload, SymbolSetsPayload, TruthTablePayload,
    WorkerRequest, WorkerResponse,
};
use super::spawner::{DiagnosticStream, OutputStream, WorkerProcess, WorkerSpawner};
use crate::config::TimeoutSettings;

/// Default time allowed for the worker to connect back.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default time allowed for a single request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default time allowed for each shutdown phase.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

type SocketSink = SplitSink<WorkerSocket, Message>;
type SocketStream = SplitStream<WorkerSocket>;

/// Time limits applied by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Limit for the worker to connect back; `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Limit for each request; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Limit for the exit acknowledgement and again for process exit.
    pub shutdown_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

impl BridgeOptions {
    /// Build options from `[worker.timeouts]`, where `0` means unbounded.
    pub fn from_settings(timeouts: &TimeoutSettings) -> Self {
        let bounded = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        Self {
            connect_timeout: bounded(timeouts.connect_secs),
            request_timeout: bounded(timeouts.request_secs),
            shutdown_timeout: Duration::from_secs(timeouts.shutdown_secs),
        }
    }
}

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker acknowledged `exit` and terminated on its own.
    Graceful,
    /// The worker had to be killed.
    Forced,
}

/// State shared between the bridge and its reader task.
struct Shared {
    pending: PendingTable,
    errors: ErrorHub,
    shutting_down: AtomicBool,
    exit_ack: Mutex<Option<oneshot::Sender<()>>>,
}

impl Shared {
    /// Route one inbound frame.
    async fn dispatch(&self, frame: &str) {
        let response: WorkerResponse = match serde_json::from_str(frame) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed worker frame");
                return;
            }
        };

        let id = response.correlation_id;
        let completion = self.pending.take(&id).await;

        match response.effective_status() {
            ResponseStatus::Error => {
                let message = response
                    .error_message()
                    .unwrap_or("unknown worker error")
                    .to_string();
                self.errors.publish(WorkerFailure::remote(message.clone(), id));
                match completion {
                    Some(tx) => {
                        let _ = tx.send(Err(WorkerError::remote(message)));
                    }
                    None => {
                        tracing::debug!(correlation_id = %id, "error response without a pending request")
                    }
                }
            }
            ResponseStatus::Exit => {
                match self.exit_ack.lock().await.take() {
                    Some(ack) => {
                        let _ = ack.send(());
                    }
                    None => tracing::debug!(correlation_id = %id, "unsolicited exit response"),
                }
                if let Some(tx) = completion {
                    let _ = tx.send(Ok(response));
                }
            }
            _ => match completion {
                Some(tx) => {
                    tracing::debug!(correlation_id = %id, status = response.status.as_str(), "response routed");
                    if tx.send(Ok(response)).is_err() {
                        tracing::debug!(correlation_id = %id, "caller stopped waiting");
                    }
                }
                None => {
                    tracing::warn!(correlation_id = %id, "dropping response with no pending request")
                }
            },
        }
    }

    /// Connection ended: reject everything still waiting.
    async fn teardown(&self) {
        let shutting_down = self.shutting_down.load(Ordering::SeqCst);
        let reason: fn() -> WorkerError = if shutting_down {
            || WorkerError::ShutDown
        } else {
            || WorkerError::ConnectionLost
        };
        let rejected = self.pending.close_with(reason).await;
        self.exit_ack.lock().await.take();

        if shutting_down {
            tracing::debug!(rejected, "worker connection closed during shutdown");
        } else {
            self.errors.publish(WorkerFailure::transport(format!(
                "worker connection closed unexpectedly ({rejected} pending requests rejected)"
            )));
        }
    }
}

/// Bridge to one long-lived worker process.
///
/// A single WebSocket connection carries any number of concurrent requests.
/// Each request gets a fresh correlation id and a pending entry; a
/// background task routes responses by id, so callers never depend on
/// response order.
///
/// # Example
///
/// ```ignore
/// use lmat::worker::{BridgeOptions, ExecutableSpawner, WorkerBridge, protocol::*};
///
/// let spawner = ExecutableSpawner::new("./bin/SympyClient-linux.bin");
/// let bridge = WorkerBridge::initialize(&spawner, BridgeOptions::default()).await?;
///
/// let response = bridge
///     .send(kinds::EVALUATE, ExpressionPayload::new("1 + 1", Environment::default()))
///     .await?;
///
/// bridge.shutdown().await?;
/// ```
pub struct WorkerBridge {
    /// Write half of the connection; locked per frame so requests go out in
    /// call order.
    sink: Mutex<SocketSink>,

    shared: Arc<Shared>,

    /// The worker process, taken during shutdown.
    process: Mutex<Option<Box<dyn WorkerProcess>>>,

    /// Listener the worker connected to, closed during shutdown.
    listener: Mutex<Option<Handshake>>,

    reader_task: JoinHandle<()>,
    diagnostic_tasks: Vec<JoinHandle<()>>,

    options: BridgeOptions,
    port: u16,
}

impl WorkerBridge {
    /// Start a worker with `spawner` and wait for it to connect.
    pub async fn initialize(
        spawner: &dyn WorkerSpawner,
        options: BridgeOptions,
    ) -> WorkerResult<Self> {
        let handshake = Handshake::bind().await?;
        let port = handshake.port();
        tracing::info!(port, "starting worker");

        let mut process = spawner.spawn_client(port)?;
        let diagnostic_tasks = process
            .take_diagnostics()
            .into_iter()
            .map(Self::spawn_diagnostic_task)
            .collect();

        let socket = match handshake
            .accept(process.as_mut(), options.connect_timeout)
            .await
        {
            Ok(socket) => socket,
            Err(err) => {
                // Exited workers make kill fail, which is fine.
                let _ = process.kill().await;
                return Err(err);
            }
        };
        tracing::info!(port, pid = ?process.id(), "worker connected");

        let (sink, stream) = socket.split();
        let shared = Arc::new(Shared {
            pending: PendingTable::new(),
            errors: ErrorHub::new(),
            shutting_down: AtomicBool::new(false),
            exit_ack: Mutex::new(None),
        });
        let reader_task = Self::spawn_reader_task(stream, shared.clone());

        Ok(Self {
            sink: Mutex::new(sink),
            shared,
            process: Mutex::new(Some(process)),
            listener: Mutex::new(Some(handshake)),
            reader_task,
            diagnostic_tasks,
            options,
            port,
        })
    }

    /// Spawn the background task that reads responses from the worker.
    fn spawn_reader_task(mut stream: SocketStream, shared: Arc<Shared>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => shared.dispatch(text.as_str()).await,
                    Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                        Ok(text) => shared.dispatch(text).await,
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping non-utf8 worker frame")
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        if !shared.shutting_down.load(Ordering::SeqCst) {
                            tracing::warn!(error = %err, "worker connection read error");
                        }
                        break;
                    }
                }
            }

            shared.teardown().await;
        })
    }

    /// Forward one worker output stream to the log, line by line.
    fn spawn_diagnostic_task(diagnostics: DiagnosticStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut lines = BufReader::new(diagnostics.reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match diagnostics.stream {
                        OutputStream::Stdout => tracing::info!(target: "lmat::worker::stdout", "{line}"),
                        OutputStream::Stderr => tracing::warn!(target: "lmat::worker::stderr", "{line}"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(error = %err, "worker output stream closed");
                        break;
                    }
                }
            }
        })
    }

    /// Send a request and wait for its matching response.
    ///
    /// Safe to call concurrently; responses are matched by correlation id.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `kind` is the reserved `exit` type
    /// - the payload does not serialize to a JSON object
    /// - the bridge is no longer connected, or the connection drops
    /// - the request times out
    /// - the worker answers with `status: "error"`
    pub async fn send<P>(&self, kind: &str, payload: P) -> WorkerResult<WorkerResponse>
    where
        P: Serialize,
    {
        self.send_inner(kind, payload, None).await
    }

    /// Like [`send`](Self::send), but gives up when `cancel` fires.
    pub async fn send_with_cancel<P>(
        &self,
        kind: &str,
        payload: P,
        cancel: &CancellationToken,
    ) -> WorkerResult<WorkerResponse>
    where
        P: Serialize,
    {
        self.send_inner(kind, payload, Some(cancel)).await
    }

    async fn send_inner<P>(
        &self,
        kind: &str,
        payload: P,
        cancel: Option<&CancellationToken>,
    ) -> WorkerResult<WorkerResponse>
    where
        P: Serialize,
    {
        if kind == kinds::EXIT {
            return Err(WorkerError::ReservedKind(kind.to_string()));
        }
        let payload = payload_object(payload)?;

        let (id, rx) = self.shared.pending.register().await?;
        let request = WorkerRequest::new(kind, id, payload);

        if let Err(err) = self.transmit(&request).await {
            self.shared.pending.remove(&id).await;
            return Err(err);
        }
        tracing::debug!(correlation_id = %id, kind, "request sent");

        let response = async { rx.await.unwrap_or(Err(WorkerError::ChannelClosed)) };
        let bounded = with_limit(self.options.request_timeout, response);

        let outcome = match cancel {
            Some(token) => tokio::select! {
                outcome = bounded => outcome,
                _ = token.cancelled() => {
                    self.shared.pending.remove(&id).await;
                    tracing::debug!(correlation_id = %id, "request cancelled");
                    return Err(WorkerError::Cancelled);
                }
            },
            None => bounded.await,
        };

        match outcome {
            Some(result) => result,
            None => {
                // Clean up pending request to prevent a leak.
                self.shared.pending.remove(&id).await;
                let limit = self.options.request_timeout.unwrap_or_default();
                tracing::warn!(correlation_id = %id, kind, "request timed out");
                Err(WorkerError::Timeout(limit))
            }
        }
    }

    async fn transmit(&self, request: &WorkerRequest) -> WorkerResult<()> {
        let frame = serde_json::to_string(request).map_err(WorkerError::SerializeFailed)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(WorkerError::WriteFailed)
    }

    /// Register a callback invoked for every worker failure.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&WorkerFailure) + Send + Sync + 'static,
    {
        self.shared.errors.on_error(callback);
    }

    /// Subscribe to worker failures as a stream.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<WorkerFailure> {
        self.shared.errors.subscribe()
    }

    /// Orderly shutdown: send `exit`, wait for the acknowledgement, close
    /// the connection and listener, then reap the process.
    ///
    /// Every wait is bounded by `shutdown_timeout`; a worker that does not
    /// acknowledge or exit in time is killed and [`ShutdownOutcome::Forced`]
    /// is returned.
    pub async fn shutdown(&self) -> WorkerResult<ShutdownOutcome> {
        if self.shared.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::NotConnected);
        }
        let limit = self.options.shutdown_timeout;

        let (ack_tx, ack_rx) = oneshot::channel();
        *self.shared.exit_ack.lock().await = Some(ack_tx);

        let exit = WorkerRequest::new(kinds::EXIT, Uuid::new_v4(), Map::new());
        let acknowledged = if self.reader_task.is_finished() {
            false
        } else {
            match self.transmit(&exit).await {
                Ok(()) => matches!(tokio::time::timeout(limit, ack_rx).await, Ok(Ok(()))),
                Err(err) => {
                    tracing::warn!(error = %err, "could not send exit request");
                    false
                }
            }
        };
        if !acknowledged {
            tracing::warn!("worker did not acknowledge exit");
        }

        {
            let mut sink = self.sink.lock().await;
            if let Err(err) = sink.close().await {
                tracing::debug!(error = %err, "closing worker connection");
            }
        }
        self.listener.lock().await.take();
        self.shared.pending.close_with(|| WorkerError::ShutDown).await;

        let exited = self.reap_process(acknowledged).await;
        self.reader_task.abort();

        Ok(if acknowledged && exited {
            ShutdownOutcome::Graceful
        } else {
            ShutdownOutcome::Forced
        })
    }

    /// Wait for the process to exit on its own, or kill it. Returns whether
    /// it exited without being killed.
    async fn reap_process(&self, acknowledged: bool) -> bool {
        let Some(mut process) = self.process.lock().await.take() else {
            return true;
        };

        if acknowledged {
            match tokio::time::timeout(self.options.shutdown_timeout, process.wait()).await {
                Ok(Ok(code)) => {
                    tracing::info!(?code, "worker exited");
                    return true;
                }
                Ok(Err(err)) => tracing::warn!(error = %err, "waiting for worker exit failed"),
                Err(_) => tracing::warn!("worker did not exit in time"),
            }
        }

        tracing::warn!(pid = ?process.id(), "killing worker");
        if let Err(err) = process.kill().await {
            tracing::debug!(error = %err, "killing worker");
        }
        false
    }

    /// Whether the connection is up and no shutdown has started.
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished() && !self.shared.shutting_down.load(Ordering::SeqCst)
    }

    /// Number of requests waiting for a response.
    pub async fn pending_requests(&self) -> usize {
        self.shared.pending.len().await
    }

    /// Port of the listener the worker connected to.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }
}

// Convenience methods for common operations
impl WorkerBridge {
    /// Run one of the evaluate-family requests (`evaluate`, `evalf`,
    /// `expand`, `factor`, `apart`, `convert-sympy`, `convert-units`).
    pub async fn evaluate(
        &self,
        kind: &str,
        payload: &ExpressionPayload,
    ) -> WorkerResult<WorkerResponse> {
        self.send(kind, payload).await
    }

    pub async fn solve(&self, payload: &SolvePayload) -> WorkerResult<WorkerResponse> {
        self.send(kinds::SOLVE, payload).await
    }

    pub async fn truth_table(&self, payload: &TruthTablePayload) -> WorkerResult<WorkerResponse> {
        self.send(kinds::TRUTH_TABLE, payload).await
    }

    pub async fn symbol_sets(&self, payload: &SymbolSetsPayload) -> WorkerResult<WorkerResponse> {
        self.send(kinds::SYMBOL_SETS, payload).await
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.reader_task.abort();
        for task in &self.diagnostic_tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for WorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBridge")
            .field("port", &self.port)
            .field("alive", &self.is_alive())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Serialize a payload, which must be a JSON object (or unit).
fn payload_object<P: Serialize>(payload: P) -> WorkerResult<Map<String, Value>> {
    match serde_json::to_value(payload).map_err(WorkerError::SerializeFailed)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(WorkerError::SerializeFailed(serde::ser::Error::custom(
            format!("payload must be a JSON object, got {other}"),
        ))),
    }
}

/// Await `fut`, giving up after `limit` if there is one.
async fn with_limit<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
