//! Solving, with a follow-up prompt when several variables are free.

use async_trait::async_trait;

use crate::worker::protocol::{
    MultivariateResult, ResponseStatus, SolvePayload, WorkerResponse, MULTIVARIATE_STATUS,
};

use super::{result_text, CommandContext, CommandError, CommandResult, Edit, MathCommand, Target};

/// `solve-latex-expression`.
///
/// When the worker reports a multivariate equation, the prompter picks
/// the symbols to solve for and the domain, and the request is sent again.
/// The solution goes into a new display block after the equation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveCommand;

#[async_trait]
impl MathCommand for SolveCommand {
    fn id(&self) -> &str {
        "solve-latex-expression"
    }

    fn target(&self) -> Target {
        Target::Equation
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> CommandResult<Edit> {
        let equation = ctx.equation_at_cursor()?;
        let mut environment = ctx.environment()?;

        let mut payload = SolvePayload {
            expression: equation.contents.clone(),
            environment: environment.clone(),
            symbols: None,
        };
        let mut response = ctx.bridge.solve(&payload).await?;

        if is_multivariate(&response) {
            let offer = multivariate_result(&response)?;
            let config = ctx
                .prompter
                .select_solve_config(
                    &offer.symbols,
                    offer.equation_count,
                    environment.domain.as_deref().unwrap_or(""),
                )
                .await?;

            if config.symbols.len() != offer.equation_count {
                return Err(CommandError::InvalidSelection {
                    expected: offer.equation_count,
                    selected: config.symbols.len(),
                });
            }

            environment.domain = Some(config.domain).filter(|domain| !domain.is_empty());
            payload.environment = environment;
            payload.symbols = Some(
                config
                    .symbols
                    .into_iter()
                    .map(|symbol| symbol.sympy_symbol)
                    .collect(),
            );
            tracing::debug!(symbols = ?payload.symbols, "solving for selected symbols");
            response = ctx.bridge.solve(&payload).await?;
        }

        match response.effective_status() {
            ResponseStatus::Success => {
                let solution = result_text(&response)?;
                Ok(Edit::new(equation.block_to, format!("\n$${solution}$$")))
            }
            other => Err(CommandError::UnexpectedStatus(other.as_str().to_string())),
        }
    }
}

fn is_multivariate(response: &WorkerResponse) -> bool {
    response.effective_status() == ResponseStatus::Other(MULTIVARIATE_STATUS.to_string())
}

fn multivariate_result(response: &WorkerResponse) -> CommandResult<MultivariateResult> {
    response
        .result_value()
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or(CommandError::MissingResult("symbols"))
}
