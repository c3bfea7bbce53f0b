//! # lmat
//!
//! Editor-side bridge to a symbolic math worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Command (evaluate, solve, convert, ...)       │
//! └─────────────────────────────────────────────────────────┘
//!          │                     │                    │
//!          ▼ [equation]          ▼ [environment]      │
//! ┌───────────────────┐ ┌──────────────────────────┐  │
//! │   EquationSpan    │ │       Environment        │  │
//! │ (math around the  │ │ (block + inline defs     │  │
//! │  cursor)          │ │  before the cursor)      │  │
//! └───────────────────┘ └──────────────────────────┘  │
//!          │                     │                    │
//!          └──────────┬──────────┘                    │
//!                     ▼ [worker]                      │
//! ┌─────────────────────────────────────────────────────────┐
//! │   WorkerBridge: request/response over one WebSocket      │
//! └─────────────────────────────────────────────────────────┘
//!                     │
//!                     ▼
//!               Edit applied to the document
//! ```

pub mod commands;
pub mod config;
pub mod document;
pub mod environment;
pub mod equation;
pub mod worker;

pub use commands::{CommandContext, CommandError, Edit, MathCommand, Prompter};
pub use config::Settings;
pub use document::{DocumentView, MarkdownDocument};
pub use environment::{Environment, EnvironmentResolver};
pub use equation::{extract_equation, EquationSpan};
pub use worker::{BridgeOptions, WorkerBridge, WorkerError};
