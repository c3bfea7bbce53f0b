//! Declarative environment block.
//!
//! ```toml
//! domain = "Reals"
//!
//! [symbols]
//! x = ["positive"]
//! n = { assumptions = ["integer"] }
//!
//! [variables]
//! g = "9.82"
//!
//! [functions]
//! f = { args = ["t"], expr = "t^2" }
//!
//! [units]
//! system = "SI"
//! exclude = ["m"]
//! ```
//!
//! Unknown sections are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{Environment, FunctionDef};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlockConfig {
    symbols: BTreeMap<String, SymbolEntry>,
    variables: BTreeMap<String, String>,
    functions: BTreeMap<String, FunctionDef>,
    units: UnitsSection,
    domain: Option<DomainEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SymbolEntry {
    Assumptions(Vec<String>),
    Table { assumptions: Vec<String> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UnitsSection {
    system: Option<String>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DomainEntry {
    Expression(String),
    Table { domain: String },
}

/// Parse a block body into a base environment.
pub fn parse_block(body: &str) -> Result<Environment, toml::de::Error> {
    let config: BlockConfig = toml::from_str(body)?;

    let symbols = config
        .symbols
        .into_iter()
        .map(|(name, entry)| {
            let assumptions = match entry {
                SymbolEntry::Assumptions(list) => list,
                SymbolEntry::Table { assumptions } => assumptions,
            };
            (name, assumptions)
        })
        .collect();

    let domain = config.domain.map(|entry| match entry {
        DomainEntry::Expression(expr) => expr,
        DomainEntry::Table { domain } => domain,
    });

    Ok(Environment {
        symbols,
        variables: config.variables,
        functions: config.functions,
        unit_system: config.units.system,
        excluded_symbols: config.units.exclude,
        domain,
    })
}
