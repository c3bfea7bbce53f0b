//! Worker-specific error types.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while talking to the computation worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to bind the local listener the worker connects back to.
    #[error("failed to bind worker listener: {0}")]
    BindFailed(#[source] io::Error),

    /// Failed to spawn the worker process.
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// The worker process exited before it opened a connection.
    #[error("worker process exited before connecting (exit code: {code:?})")]
    ExitedBeforeConnect {
        /// Exit code, if the platform reported one.
        code: Option<i32>,
    },

    /// No connection arrived within the connect timeout.
    #[error("worker did not connect within {0:?}")]
    ConnectTimeout(Duration),

    /// Accepting the TCP connection or upgrading it to a WebSocket failed.
    #[error("worker handshake failed: {0}")]
    HandshakeFailed(String),

    /// Failed to write a frame to the worker.
    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] tungstenite::Error),

    /// Failed to serialize request to JSON.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a response payload.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Request timed out waiting for its response.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The connection dropped while requests were outstanding.
    #[error("connection to worker lost")]
    ConnectionLost,

    /// The bridge was shut down while the request was outstanding.
    #[error("worker bridge shut down")]
    ShutDown,

    /// The bridge is no longer usable (connection lost or shut down).
    #[error("worker bridge is not connected")]
    NotConnected,

    /// Response channel was closed (internal error).
    #[error("response channel closed unexpectedly")]
    ChannelClosed,

    /// The reserved request type cannot be sent through the public API.
    #[error("request type {0:?} is reserved")]
    ReservedKind(String),

    /// Worker answered with an `error` status.
    #[error("worker error: {message}")]
    Remote {
        /// Error message from the worker.
        message: String,
    },
}

impl WorkerError {
    /// Create a remote error from an error response.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Check if this error indicates the connection is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost | Self::NotConnected | Self::ChannelClosed
        )
    }

    /// Check if this error is retriable against a fresh bridge.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ConnectionLost | Self::ChannelClosed | Self::ConnectTimeout(_)
        )
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::DeserializeFailed(err)
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for WorkerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
