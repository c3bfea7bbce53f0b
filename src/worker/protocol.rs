//! Protocol types for worker communication.
//!
//! Every frame is one JSON object carried in a WebSocket text frame.
//! Requests carry a fresh correlation id which the worker echoes back on the
//! matching response; responses may arrive in any order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::environment::Environment;

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Request type (e.g., "evaluate", "solve").
    #[serde(rename = "type")]
    pub kind: String,
    /// Unique request id for correlation.
    pub correlation_id: Uuid,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl WorkerRequest {
    pub fn new(kind: impl Into<String>, correlation_id: Uuid, payload: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            correlation_id,
            payload,
        }
    }
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Outcome of the request.
    pub status: ResponseStatus,
    /// Request id this response corresponds to.
    #[serde(alias = "uid")]
    pub correlation_id: Uuid,
    /// Type-specific result object.
    #[serde(default, alias = "response")]
    pub result: Map<String, Value>,
}

impl WorkerResponse {
    pub fn new(status: ResponseStatus, correlation_id: Uuid, result: Map<String, Value>) -> Self {
        Self {
            status,
            correlation_id,
            result,
        }
    }

    /// The inner `result` value most request types report their answer in.
    pub fn result_value(&self) -> Option<&Value> {
        self.result.get("result")
    }

    /// The inner `result` value, if it is a string.
    pub fn result_text(&self) -> Option<&str> {
        self.result_value().and_then(Value::as_str)
    }

    /// Status reported inside the result object, falling back to the
    /// envelope status.
    ///
    /// Handlers such as `solve` report domain statuses (for example
    /// `multivariate_equation`) inside the result while the envelope says
    /// the request itself completed.
    pub fn effective_status(&self) -> ResponseStatus {
        self.result
            .get("status")
            .and_then(Value::as_str)
            .map(ResponseStatus::from)
            .unwrap_or_else(|| self.status.clone())
    }

    /// Insertion hints attached to the result.
    pub fn metadata(&self) -> ResponseMetadata {
        self.result
            .get("metadata")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Message carried by an `error` response.
    pub fn error_message(&self) -> Option<&str> {
        self.result.get("message").and_then(Value::as_str).or_else(|| {
            self.result_value()
                .and_then(|inner| inner.get("message"))
                .and_then(Value::as_str)
        })
    }
}

/// Status of a worker response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    Success,
    Error,
    Exit,
    /// Domain-specific status such as `multivariate_equation`.
    Other(String),
}

impl ResponseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Exit => "exit",
            Self::Other(status) => status,
        }
    }
}

impl From<&str> for ResponseStatus {
    fn from(status: &str) -> Self {
        match status {
            "success" | "result" => Self::Success,
            "error" => Self::Error,
            "exit" => Self::Exit,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResponseStatus {
    fn from(status: String) -> Self {
        Self::from(status.as_str())
    }
}

impl From<ResponseStatus> for String {
    fn from(status: ResponseStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Optional hints on where and how to insert a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// 1-based line, relative to the start of the expression, to append to.
    #[serde(default)]
    pub end_line: Option<usize>,
    /// String joining expression and result (`=`, `≈`, ...).
    #[serde(default)]
    pub separator: Option<String>,
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload for the evaluate family (`evaluate`, `evalf`, `expand`, `factor`,
/// `apart`, `convert-sympy`, `convert-units`).
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionPayload {
    pub expression: String,
    pub environment: Environment,
    /// Target units, only for `convert-units`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_units: Option<Vec<String>>,
}

impl ExpressionPayload {
    pub fn new(expression: impl Into<String>, environment: Environment) -> Self {
        Self {
            expression: expression.into(),
            environment,
            target_units: None,
        }
    }
}

/// Payload for `solve`.
#[derive(Debug, Clone, Serialize)]
pub struct SolvePayload {
    pub expression: String,
    pub environment: Environment,
    /// Symbols to solve for; omitted on the first attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
}

/// Output format of a truth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruthTableFormat {
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "latex-array")]
    LatexArray,
}

impl TruthTableFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::LatexArray => "latex-array",
        }
    }
}

/// Payload for `truth-table`.
#[derive(Debug, Clone, Serialize)]
pub struct TruthTablePayload {
    pub expression: String,
    pub environment: Environment,
    pub table_format: TruthTableFormat,
}

/// Payload for `symbolsets`, which only needs the environment.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolSetsPayload {
    pub environment: Environment,
}

/// A symbol offered by the worker when an equation is underdetermined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolveSymbol {
    pub sympy_symbol: String,
    pub latex_symbol: String,
}

/// Result body of a `multivariate_equation` solve response.
#[derive(Debug, Clone, Deserialize)]
pub struct MultivariateResult {
    pub symbols: Vec<SolveSymbol>,
    pub equation_count: usize,
}

// ============================================================================
// Request types
// ============================================================================

/// Request type names understood by the worker.
pub mod kinds {
    pub const EVALUATE: &str = "evaluate";
    pub const EVALF: &str = "evalf";
    pub const EXPAND: &str = "expand";
    pub const FACTOR: &str = "factor";
    pub const APART: &str = "apart";
    pub const SOLVE: &str = "solve";
    pub const CONVERT_SYMPY: &str = "convert-sympy";
    pub const CONVERT_UNITS: &str = "convert-units";
    pub const SYMBOL_SETS: &str = "symbolsets";
    pub const TRUTH_TABLE: &str = "truth-table";
    /// Reserved for the shutdown handshake.
    pub const EXIT: &str = "exit";
}

/// Domain status sent by `solve` when it needs the caller to pick symbols.
pub const MULTIVARIATE_STATUS: &str = "multivariate_equation";
