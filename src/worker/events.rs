//! Process-wide error observers.
//!
//! Worker-reported errors and transport failures are published here in
//! addition to rejecting the affected request, so they stay visible even
//! when a caller ignores its own `Result`. Observers can either register a
//! callback or subscribe to a broadcast stream; both are fed from
//! [`ErrorHub::publish`].

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the broadcast channel; slow subscribers see `Lagged`.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Where a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The worker answered a request with `status: "error"`.
    Remote,
    /// The process or connection failed.
    Transport,
}

/// A failure observed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Request the failure belongs to, when there is one.
    pub correlation_id: Option<Uuid>,
}

impl WorkerFailure {
    pub fn remote(message: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            kind: FailureKind::Remote,
            message: message.into(),
            correlation_id: Some(correlation_id),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
            correlation_id: None,
        }
    }
}

/// Callback invoked for every published failure.
pub type ErrorCallback = Arc<dyn Fn(&WorkerFailure) + Send + Sync>;

/// Fan-out point for worker failures.
pub struct ErrorHub {
    callbacks: RwLock<Vec<ErrorCallback>>,
    sender: broadcast::Sender<WorkerFailure>,
}

impl ErrorHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            callbacks: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a callback.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&WorkerFailure) + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Subscribe to failures published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerFailure> {
        self.sender.subscribe()
    }

    /// Deliver `failure` to every callback and subscriber.
    pub fn publish(&self, failure: WorkerFailure) {
        tracing::error!(
            kind = ?failure.kind,
            correlation_id = ?failure.correlation_id,
            "worker failure: {}",
            failure.message
        );

        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback(&failure);
        }

        // No subscribers is fine.
        let _ = self.sender.send(failure);
    }
}

impl Default for ErrorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self
            .callbacks
            .read()
            .map(|callbacks| callbacks.len())
            .unwrap_or_default();
        f.debug_struct("ErrorHub")
            .field("callbacks", &callbacks)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
