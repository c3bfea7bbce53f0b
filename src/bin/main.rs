//! lmat CLI - run math commands on Markdown files
//!
//! Usage:
//!   lmat extract <file.md> (--offset N | --line L --character C)
//!   lmat env <file.md> (--offset N | --line L --character C)
//!   lmat run <command> <file.md> (--offset N | --line L --character C) [--write]
//!
//! Examples:
//!   lmat extract notes.md --line 4 --character 10
//!   lmat run evaluate-latex-expression notes.md --offset 120 --write
//!   lmat run solve-latex-expression notes.md --offset 80 --symbols x,y --domain Reals

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use dialoguer::{Input, MultiSelect};
use tracing_subscriber::EnvFilter;

use lmat::commands::{
    find_command, CommandContext, CommandError, CommandResult, Prompter, SolveConfig,
    StaticPrompter,
};
use lmat::config::Settings;
use lmat::document::{position_to_offset, DocumentView, MarkdownDocument, Position};
use lmat::environment::EnvironmentResolver;
use lmat::equation::extract_equation;
use lmat::worker::protocol::SolveSymbol;
use lmat::worker::{spawner_from_settings, BridgeOptions, ShutdownOutcome, WorkerBridge};

#[derive(Parser)]
#[command(name = "lmat")]
#[command(about = "lmat - symbolic math commands for Markdown notes")]
#[command(version)]
struct Cli {
    /// Path to a config file (defaults to $LMAT_CONFIG, ./lmat.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the equation around a position as JSON
    Extract {
        /// Path to the Markdown file
        file: PathBuf,

        #[command(flatten)]
        position: PositionArgs,
    },

    /// Print the environment in effect at a position as JSON
    Env {
        /// Path to the Markdown file
        file: PathBuf,

        #[command(flatten)]
        position: PositionArgs,
    },

    /// Run a command through the worker
    Run {
        /// Command id, e.g. evaluate-latex-expression
        command: String,

        /// Path to the Markdown file
        file: PathBuf,

        #[command(flatten)]
        position: PositionArgs,

        /// End of the selection; the position is its start
        #[arg(long)]
        selection_end: Option<usize>,

        /// Write the result back to the file instead of printing it
        #[arg(short, long)]
        write: bool,

        /// Symbols to solve for, comma separated
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,

        /// Solution domain
        #[arg(long)]
        domain: Option<String>,

        /// Target units, space separated
        #[arg(long)]
        units: Option<String>,
    },
}

#[derive(Args)]
struct PositionArgs {
    /// Byte offset into the file
    #[arg(long, conflicts_with_all = ["line", "character"])]
    offset: Option<usize>,

    /// Zero-based line
    #[arg(long, requires = "character")]
    line: Option<usize>,

    /// Zero-based UTF-16 column
    #[arg(long, requires = "line")]
    character: Option<usize>,
}

impl PositionArgs {
    fn resolve(&self, source: &str) -> Result<usize, CliError> {
        match (self.offset, self.line, self.character) {
            (Some(offset), _, _) => Ok(offset.min(source.len())),
            (None, Some(line), Some(character)) => {
                Ok(position_to_offset(source, Position::new(line, character)))
            }
            _ => Err(CliError::MissingPosition),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error reading file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error writing file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("A position is required: --offset, or --line with --character")]
    MissingPosition,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract { file, position } => cmd_extract(&file, &position),
        Commands::Env { file, position } => cmd_env(cli.config.as_deref(), &file, &position),
        Commands::Run {
            command,
            file,
            position,
            selection_end,
            write,
            symbols,
            domain,
            units,
        } => {
            let answers = StaticPrompter {
                symbols,
                domain,
                units: units.map(|units| units.split_whitespace().map(str::to_string).collect()),
            };
            let request = RunRequest {
                command,
                file,
                position,
                selection_end,
                write,
            };
            cmd_run(cli.config.as_deref(), request, answers).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `LMAT_LOG`, then `RUST_LOG`, then `warn` (`debug` with `-v`).
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("LMAT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_source(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    let settings = match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    settings.map_err(|err| CliError::Command(err.into()))
}

fn cmd_extract(file: &Path, position: &PositionArgs) -> Result<(), CliError> {
    let source = read_source(file)?;
    let offset = position.resolve(&source)?;
    let doc = MarkdownDocument::new(source);

    let span = extract_equation(offset, &doc).ok_or(CommandError::NotInMath)?;
    println!("{}", serde_json::to_string_pretty(&span)?);
    Ok(())
}

fn cmd_env(config: Option<&Path>, file: &Path, position: &PositionArgs) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let source = read_source(file)?;
    let offset = position.resolve(&source)?;
    let doc = MarkdownDocument::new(source);

    let resolver = EnvironmentResolver::from_settings(&settings.environment);
    let env = resolver
        .resolve(&doc, offset)
        .map_err(|err| CliError::Command(err.into()))?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(())
}

struct RunRequest {
    command: String,
    file: PathBuf,
    position: PositionArgs,
    selection_end: Option<usize>,
    write: bool,
}

async fn cmd_run(
    config: Option<&Path>,
    request: RunRequest,
    answers: StaticPrompter,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let command = find_command(&request.command)?;

    let source = read_source(&request.file)?;
    let cursor = request.position.resolve(&source)?;
    let selection = request
        .selection_end
        .map(|end| (cursor, end.min(source.len())));
    let doc = MarkdownDocument::new(source);
    command.target().check(&doc, cursor, selection)?;

    let resolver = EnvironmentResolver::from_settings(&settings.environment);
    let prompter = TerminalPrompter { answers };

    let spawner = spawner_from_settings(&settings.worker).map_err(CommandError::from)?;
    let options = BridgeOptions::from_settings(&settings.worker.timeouts);
    let bridge = WorkerBridge::initialize(spawner.as_ref(), options)
        .await
        .map_err(CommandError::from)?;

    let ctx = CommandContext {
        bridge: &bridge,
        document: &doc,
        resolver: &resolver,
        prompter: &prompter,
        cursor,
        selection,
    };
    let outcome = command.run(&ctx).await;

    match bridge.shutdown().await {
        Ok(ShutdownOutcome::Forced) => tracing::warn!("worker did not exit cleanly and was killed"),
        Ok(ShutdownOutcome::Graceful) => {}
        Err(err) => tracing::warn!(error = %err, "worker shutdown failed"),
    }

    let edit = outcome?;
    let updated = edit.apply(doc.text());

    if request.write {
        fs::write(&request.file, updated).map_err(|source| CliError::Write {
            path: request.file.clone(),
            source,
        })?;
        eprintln!("Updated {}", request.file.display());
    } else {
        print!("{}", updated);
    }
    Ok(())
}

/// Uses answers given on the command line, asking in the terminal otherwise.
struct TerminalPrompter {
    answers: StaticPrompter,
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn select_solve_config(
        &self,
        symbols: &[SolveSymbol],
        equation_count: usize,
        domain: &str,
    ) -> CommandResult<SolveConfig> {
        if self.answers.symbols.is_some() {
            return self
                .answers
                .select_solve_config(symbols, equation_count, domain)
                .await;
        }

        let symbols = symbols.to_vec();
        let domain = self.answers.domain.clone().unwrap_or_else(|| domain.to_string());
        tokio::task::spawn_blocking(move || {
            let labels: Vec<&str> = symbols.iter().map(|s| s.latex_symbol.as_str()).collect();
            let picked = MultiSelect::new()
                .with_prompt(format!("Select {equation_count} symbol(s) to solve for"))
                .items(&labels)
                .interact()
                .map_err(|_| CommandError::PromptCancelled)?;
            let domain: String = Input::new()
                .with_prompt("Solution domain")
                .with_initial_text(domain)
                .allow_empty(true)
                .interact_text()
                .map_err(|_| CommandError::PromptCancelled)?;

            Ok(SolveConfig {
                symbols: picked.into_iter().map(|idx| symbols[idx].clone()).collect(),
                domain,
            })
        })
        .await
        .map_err(|_| CommandError::PromptCancelled)?
    }

    async fn target_units(&self) -> CommandResult<Vec<String>> {
        if let Some(units) = &self.answers.units {
            return Ok(units.clone());
        }

        tokio::task::spawn_blocking(|| {
            let units: String = Input::new()
                .with_prompt("Target units")
                .interact_text()
                .map_err(|_| CommandError::PromptCancelled)?;
            Ok(units.split_whitespace().map(str::to_string).collect())
        })
        .await
        .map_err(|_| CommandError::PromptCancelled)?
    }
}
