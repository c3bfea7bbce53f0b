//! Environment resolution.
//!
//! An [`Environment`] tells the worker how to interpret an expression:
//! symbol assumptions, variable and function substitutions, the unit
//! system and the solution domain. It is rebuilt for every request from the
//! closest declarative block before the cursor plus the inline definitions
//! written between that block and the cursor.

mod block;
mod definitions;
mod resolve;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use block::parse_block;
pub use definitions::{scan_definitions, Definition};
pub use resolve::EnvironmentResolver;

/// Errors raised while building an environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Invalid environment block at offset {offset}: {source}")]
    InvalidBlock {
        offset: usize,
        #[source]
        source: toml::de::Error,
    },
}

pub type EnvironmentResult<T> = Result<T, EnvironmentError>;

/// A function definition such as `f(x, y) := x^2 + y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub args: Vec<String>,
    pub expr: String,
}

/// Everything the worker needs to interpret one expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Symbol name to assumption keywords (`positive`, `integer`, ...).
    #[serde(default)]
    pub symbols: BTreeMap<String, Vec<String>>,

    /// Variable name to the expression substituted for it.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_symbols: Option<Vec<String>>,

    /// Default solution domain, as an expression (`Reals`, `Interval(0, 1)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Environment {
    /// Apply one inline definition; an empty value removes the name.
    pub fn apply(&mut self, definition: &Definition) {
        let value = definition.value.trim();
        match &definition.args {
            None if value.is_empty() => {
                self.variables.remove(&definition.name);
            }
            None => {
                self.variables
                    .insert(definition.name.clone(), value.to_string());
            }
            Some(_) if value.is_empty() => {
                self.functions.remove(&definition.name);
            }
            Some(args) => {
                self.functions.insert(
                    definition.name.clone(),
                    FunctionDef {
                        args: args.clone(),
                        expr: value.to_string(),
                    },
                );
            }
        }
    }
}
