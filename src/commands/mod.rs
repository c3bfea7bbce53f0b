//! Editor commands.
//!
//! Each command extracts the equation at the cursor (or the selection),
//! resolves the environment there, sends one or two requests through the
//! [`WorkerBridge`] and returns an [`Edit`] for the host to apply.

mod convert;
mod evaluate;
mod solve;
mod symbol_sets;
mod truth_table;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SettingsError;
use crate::document::DocumentView;
use crate::environment::{Environment, EnvironmentError, EnvironmentResolver};
use crate::equation::{extract_equation, EquationSpan};
use crate::worker::protocol::{kinds, SolveSymbol, TruthTableFormat};
use crate::worker::{WorkerBridge, WorkerError};

pub use convert::SympyConvertCommand;
pub use evaluate::{EvaluateCommand, UnitConvertCommand};
pub use solve::SolveCommand;
pub use symbol_sets::SymbolSetsCommand;
pub use truth_table::TruthTableCommand;

/// Errors a command can end with.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("You are not inside a math block")]
    NotInMath,

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Select exactly {expected} symbol(s) to solve for, got {selected}")]
    InvalidSelection { expected: usize, selected: usize },

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(String),

    #[error("Worker response is missing `{0}`")]
    MissingResult(&'static str),

    #[error("Prompt cancelled")]
    PromptCancelled,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Text insertion produced by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    /// Byte offset to insert at.
    pub at: usize,
    pub insert: String,
    /// Cursor offset after the edit is applied.
    pub cursor: usize,
}

impl Edit {
    /// Insertion with the cursor placed after the inserted text.
    pub fn new(at: usize, insert: impl Into<String>) -> Self {
        let insert = insert.into();
        Self {
            at,
            cursor: at + insert.len(),
            insert,
        }
    }

    /// Apply the edit to `text`.
    pub fn apply(&self, text: &str) -> String {
        let at = self.at.min(text.len());
        let mut out = String::with_capacity(text.len() + self.insert.len());
        out.push_str(&text[..at]);
        out.push_str(&self.insert);
        out.push_str(&text[at..]);
        out
    }
}

/// Answers to the solve follow-up prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveConfig {
    pub symbols: Vec<SolveSymbol>,
    pub domain: String,
}

/// Interactive follow-up questions some commands need answered.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Pick the symbols to solve for (as many as there are equations) and
    /// the solution domain, starting from `domain`.
    async fn select_solve_config(
        &self,
        symbols: &[SolveSymbol],
        equation_count: usize,
        domain: &str,
    ) -> CommandResult<SolveConfig>;

    /// Units to convert the result to.
    async fn target_units(&self) -> CommandResult<Vec<String>>;
}

/// Prompter with answers fixed up front.
///
/// Solve symbols are matched against either their worker or their LaTeX
/// name. A missing answer cancels the prompt.
#[derive(Debug, Clone, Default)]
pub struct StaticPrompter {
    pub symbols: Option<Vec<String>>,
    pub domain: Option<String>,
    pub units: Option<Vec<String>>,
}

#[async_trait]
impl Prompter for StaticPrompter {
    async fn select_solve_config(
        &self,
        symbols: &[SolveSymbol],
        _equation_count: usize,
        domain: &str,
    ) -> CommandResult<SolveConfig> {
        let wanted = self.symbols.as_ref().ok_or(CommandError::PromptCancelled)?;
        let selected = wanted
            .iter()
            .filter_map(|name| {
                symbols
                    .iter()
                    .find(|s| &s.sympy_symbol == name || &s.latex_symbol == name)
                    .cloned()
            })
            .collect();

        Ok(SolveConfig {
            symbols: selected,
            domain: self.domain.clone().unwrap_or_else(|| domain.to_string()),
        })
    }

    async fn target_units(&self) -> CommandResult<Vec<String>> {
        self.units.clone().ok_or(CommandError::PromptCancelled)
    }
}

/// Everything a command runs against.
pub struct CommandContext<'a> {
    pub bridge: &'a WorkerBridge,
    pub document: &'a (dyn DocumentView + Sync),
    pub resolver: &'a EnvironmentResolver,
    pub prompter: &'a dyn Prompter,
    /// Cursor byte offset.
    pub cursor: usize,
    /// Selected byte range, if any.
    pub selection: Option<(usize, usize)>,
}

impl<'a> CommandContext<'a> {
    /// The selection if it is non-empty, otherwise the equation at the cursor.
    pub fn equation(&self) -> CommandResult<EquationSpan> {
        match self.selection {
            Some((from, to)) if from != to => Ok(EquationSpan::from_selection(
                self.document.text(),
                from,
                to,
            )),
            _ => self.equation_at_cursor(),
        }
    }

    /// The equation at the cursor, ignoring any selection.
    pub fn equation_at_cursor(&self) -> CommandResult<EquationSpan> {
        extract_equation(self.cursor, self.document).ok_or(CommandError::NotInMath)
    }

    /// The environment in effect at the cursor.
    pub fn environment(&self) -> CommandResult<Environment> {
        Ok(self.resolver.resolve(self.document, self.cursor)?)
    }
}

/// What a command reads from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The selection if non-empty, otherwise the equation at the cursor.
    SelectionOrEquation,
    /// The equation at the cursor, ignoring any selection.
    Equation,
    /// Nothing; the command works anywhere.
    Anywhere,
}

impl Target {
    /// Fails with [`CommandError::NotInMath`] when there is nothing to act on.
    ///
    /// Needs no worker, so hosts call it before starting one.
    pub fn check<D>(
        &self,
        document: &D,
        cursor: usize,
        selection: Option<(usize, usize)>,
    ) -> CommandResult<()>
    where
        D: DocumentView + ?Sized,
    {
        let selected = matches!(selection, Some((from, to)) if from != to);
        let needs_math = match *self {
            Target::SelectionOrEquation => !selected,
            Target::Equation => true,
            Target::Anywhere => false,
        };
        if needs_math && extract_equation(cursor, document).is_none() {
            return Err(CommandError::NotInMath);
        }
        Ok(())
    }
}

/// A command invocable from the editor.
#[async_trait]
pub trait MathCommand: Send + Sync {
    /// Stable command id.
    fn id(&self) -> &str;

    fn target(&self) -> Target {
        Target::SelectionOrEquation
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit>;
}

/// Every command, in menu order.
pub fn all_commands() -> Vec<Box<dyn MathCommand>> {
    vec![
        Box::new(EvaluateCommand::new(kinds::EVALUATE)),
        Box::new(EvaluateCommand::new(kinds::EVALF)),
        Box::new(EvaluateCommand::new(kinds::EXPAND)),
        Box::new(EvaluateCommand::new(kinds::FACTOR)),
        Box::new(EvaluateCommand::new(kinds::APART)),
        Box::new(UnitConvertCommand::new()),
        Box::new(SolveCommand),
        Box::new(SympyConvertCommand),
        Box::new(TruthTableCommand::new(TruthTableFormat::Markdown)),
        Box::new(TruthTableCommand::new(TruthTableFormat::LatexArray)),
        Box::new(SymbolSetsCommand),
    ]
}

/// Look a command up by id.
pub fn find_command(id: &str) -> CommandResult<Box<dyn MathCommand>> {
    all_commands()
        .into_iter()
        .find(|command| command.id() == id)
        .ok_or_else(|| CommandError::UnknownCommand(id.to_string()))
}

/// The `result` string of a successful response.
fn result_text(response: &crate::worker::protocol::WorkerResponse) -> CommandResult<String> {
    response
        .result_text()
        .map(str::to_string)
        .ok_or(CommandError::MissingResult("result"))
}
