//! Conversion to SymPy code, inserted as a python fence.

use async_trait::async_trait;

use crate::worker::protocol::{kinds, ExpressionPayload};

use super::{result_text, CommandContext, CommandResult, Edit, MathCommand};

/// `convert-to-sympy`: places the equivalent Python code in a fenced block
/// right after the equation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SympyConvertCommand;

#[async_trait]
impl MathCommand for SympyConvertCommand {
    fn id(&self) -> &str {
        "convert-to-sympy"
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        let equation = ctx.equation()?;
        let payload = ExpressionPayload::new(equation.contents, ctx.environment()?);

        let response = ctx.bridge.evaluate(kinds::CONVERT_SYMPY, &payload).await?;
        let code = result_text(&response)?;

        Ok(Edit::new(
            equation.block_to,
            format!("\n```python\n{code}\n```\n"),
        ))
    }
}
