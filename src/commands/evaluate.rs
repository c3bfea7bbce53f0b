//! Evaluation and unit conversion of the equation at the cursor.

use async_trait::async_trait;

use crate::document::{line_end, line_of};
use crate::worker::protocol::{kinds, ExpressionPayload};

use super::{result_text, CommandContext, CommandResult, Edit, MathCommand};

/// `evaluate`, `evalf`, `expand`, `factor` and `apart`.
///
/// Appends ` = <result>` after the equation, or at the end of the line the
/// worker points at through `metadata.end_line`.
#[derive(Debug, Clone)]
pub struct EvaluateCommand {
    id: String,
    kind: String,
}

impl EvaluateCommand {
    pub fn new(kind: &str) -> Self {
        Self {
            id: format!("{kind}-latex-expression"),
            kind: kind.to_string(),
        }
    }

    fn with_id(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    async fn evaluate(
        &self,
        ctx: &CommandContext<'_>,
        target_units: Option<Vec<String>>,
    ) -> CommandResult<Edit> {
        let equation = ctx.equation()?;
        let mut payload = ExpressionPayload::new(equation.contents.clone(), ctx.environment()?);
        payload.target_units = target_units;

        let response = ctx.bridge.evaluate(&self.kind, &payload).await?;
        let result = result_text(&response)?;
        let metadata = response.metadata();

        let text = ctx.document.text();
        let at = match metadata.end_line {
            Some(end_line) => {
                let line = line_of(text, equation.from) + end_line.saturating_sub(1);
                line_end(text, line)
            }
            None => equation.to,
        };
        let separator = metadata.separator.as_deref().unwrap_or("=");

        Ok(Edit::new(at, format!(" {separator} {result}")))
    }
}

#[async_trait]
impl MathCommand for EvaluateCommand {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        self.evaluate(ctx, None).await
    }
}

/// `convert-units`: asks for target units, then evaluates with them.
#[derive(Debug, Clone)]
pub struct UnitConvertCommand {
    inner: EvaluateCommand,
}

impl UnitConvertCommand {
    pub fn new() -> Self {
        Self {
            inner: EvaluateCommand::with_id("convert-units", kinds::CONVERT_UNITS),
        }
    }
}

impl Default for UnitConvertCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MathCommand for UnitConvertCommand {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        let units = ctx.prompter.target_units().await?;
        tracing::debug!(?units, "converting units");
        self.inner.evaluate(ctx, Some(units)).await
    }
}
