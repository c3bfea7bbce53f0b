//! Truth tables as Markdown or a LaTeX array.

use async_trait::async_trait;
use serde_json::Value;

use crate::worker::protocol::{ResponseStatus, TruthTableFormat, TruthTablePayload};

use super::{CommandContext, CommandError, CommandResult, Edit, MathCommand, Target};

/// `generate-md-truth-table` and `generate-latex-array-truth-table`.
#[derive(Debug, Clone)]
pub struct TruthTableCommand {
    id: String,
    format: TruthTableFormat,
}

impl TruthTableCommand {
    pub fn new(format: TruthTableFormat) -> Self {
        Self {
            id: format!("generate-{}-truth-table", format.as_str()),
            format,
        }
    }
}

#[async_trait]
impl MathCommand for TruthTableCommand {
    fn id(&self) -> &str {
        &self.id
    }

    fn target(&self) -> Target {
        Target::Equation
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        let equation = ctx.equation_at_cursor()?;
        let payload = TruthTablePayload {
            expression: equation.contents.clone(),
            environment: ctx.environment()?,
            table_format: self.format,
        };

        let response = ctx.bridge.truth_table(&payload).await?;
        match response.effective_status() {
            ResponseStatus::Success => {}
            other => return Err(CommandError::UnexpectedStatus(other.as_str().to_string())),
        }

        let table = response
            .result_value()
            .and_then(|result| result.get("truth_table"))
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingResult("truth_table"))?;

        let insert = match self.format {
            TruthTableFormat::Markdown => format!("\n{table}"),
            TruthTableFormat::LatexArray => format!("$$\n\n{table}\n$$"),
        };
        Ok(Edit::new(equation.block_to, insert))
    }
}
