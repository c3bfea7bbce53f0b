//! Symbol sets of the current environment, inserted at the cursor.

use async_trait::async_trait;

use crate::worker::protocol::SymbolSetsPayload;

use super::{result_text, CommandContext, CommandResult, Edit, MathCommand, Target};

/// `show-symbol-sets`: inserts, as display math at the cursor, the array
/// listing which number set each declared symbol belongs to.
///
/// Works anywhere in the document; only the environment is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolSetsCommand;

#[async_trait]
impl MathCommand for SymbolSetsCommand {
    fn id(&self) -> &str {
        "show-symbol-sets"
    }

    fn target(&self) -> Target {
        Target::Anywhere
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        let payload = SymbolSetsPayload {
            environment: ctx.environment()?,
        };

        let response = ctx.bridge.symbol_sets(&payload).await?;
        let array = result_text(&response)?;

        Ok(Edit::new(ctx.cursor, format!("\n$$\n{array}\n$$\n")))
    }
}
