//! Worker communication module.
//!
//! Symbolic computation happens in a separate long-lived worker process.
//! This module starts it, connects to it and multiplexes requests over a
//! single connection while the rest of the crate stays computation-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     lmat (Rust + Tokio)                         │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                  WorkerBridge (Async)                     │  │
//! │  │  - Binds 127.0.0.1:0 and spawns the worker with the port  │  │
//! │  │  - JSON frames over one WebSocket connection              │  │
//! │  │  - Correlation ids route concurrent responses             │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              ▲                                  │
//! │                 ws://127.0.0.1:<port> (worker connects back)    │
//! │                              │                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Computation worker (packaged binary or sources)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lmat::worker::{spawner_from_settings, BridgeOptions, WorkerBridge, protocol::*};
//!
//! let spawner = spawner_from_settings(&settings.worker)?;
//! let bridge = WorkerBridge::initialize(spawner.as_ref(), BridgeOptions::default()).await?;
//!
//! bridge.on_error(|failure| eprintln!("{}", failure.message));
//! let response = bridge.send(kinds::EVALUATE, payload).await?;
//!
//! bridge.shutdown().await?;
//! ```

mod bridge;
mod error;
mod events;
mod handshake;
mod pending;
pub mod protocol;
mod spawner;

pub use bridge::{BridgeOptions, ShutdownOutcome, WorkerBridge};
pub use error::{WorkerError, WorkerResult};
pub use events::{ErrorCallback, FailureKind, WorkerFailure};
pub use handshake::{Handshake, WorkerSocket};
pub use pending::PendingTable;
pub use spawner::{
    spawner_from_settings, DiagnosticStream, ExecutableSpawner, OutputStream, Platform,
    SourceSpawner, WorkerProcess, WorkerSpawner,
};
