//! Inline definitions written in prose math.
//!
//! `$x := 5$`, `$\mathrm{v_0} := 3$` and `$f(a, b) := a b$` define a
//! variable, a wrapped variable and a function. An empty right-hand side
//! (`$x := $`) removes an earlier definition.

use std::sync::LazyLock;

use regex::Regex;

static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\s*(?:\\math\w*\{(?P<wrapped>[^=\s$]*)\}|(?P<name>[^=\s$(]+))\s*(?:\((?P<args>[^()$=]*)\))?\s*:=\s*(?P<value>[^=$]*?)\s*\$",
    )
    .expect("definition pattern is valid")
});

/// One inline definition, in the order it appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// Argument names for a function definition, `None` for a variable.
    pub args: Option<Vec<String>>,
    /// Right-hand side; empty means "undefine".
    pub value: String,
    /// Byte offset of the definition in the whole document.
    pub offset: usize,
}

/// Scan `text` for inline definitions.
///
/// `base_offset` is the document offset `text` starts at.
pub fn scan_definitions(text: &str, base_offset: usize) -> Vec<Definition> {
    DEFINITION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps
                .name("wrapped")
                .or_else(|| caps.name("name"))
                .map(|m| m.as_str())
                .filter(|name| !name.is_empty())?;

            let args = caps.name("args").map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|arg| !arg.is_empty())
                    .map(str::to_string)
                    .collect()
            });

            let offset = base_offset + caps.get(0).map_or(0, |m| m.start());
            Some(Definition {
                name: name.to_string(),
                args,
                value: caps
                    .name("value")
                    .map_or(String::new(), |m| m.as_str().to_string()),
                offset,
            })
        })
        .collect()
}
