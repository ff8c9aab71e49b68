//! ElectroGPT CLI
//!
//! Answers questions about electronics datasheets with retrieval-augmented
//! generation.

mod commands;
mod extractor;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand};
use electro_core::config::{AppConfig, ConfigOverrides};
use electro_core::{logging, AppResult, Backend};
use std::path::PathBuf;
use std::process::ExitCode;

/// ElectroGPT - ask questions about your datasheets
#[derive(Parser, Debug)]
#[command(name = "electrogpt")]
#[command(about = "Ask questions about electronics datasheets", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "ELECTROGPT_CONFIG")]
    config: Option<PathBuf>,

    /// Embedding backend (hosted, local)
    #[arg(long, global = true)]
    embedder: Option<Backend>,

    /// Language model backend (hosted, local)
    #[arg(long, global = true)]
    llm: Option<Backend>,

    /// Target chunk size in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long = "top-k", global = true)]
    top_k: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process datasheets and answer one question
    Ask(AskCommand),

    /// Process datasheets and start an interactive conversation
    Chat(ChatCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let result = run(Cli::parse()).await;

    match failure_message(&result) {
        Some(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::load_with(cli.config.as_deref())?.with_overrides(ConfigOverrides {
        embedder_backend: cli.embedder,
        llm_backend: cli.llm,
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        retrieval_k: cli.top_k,
        log_level: cli.log_level,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("ElectroGPT CLI starting");
    tracing::debug!(
        embedder = %config.embedder_backend,
        llm = %config.llm_backend,
        chunk_size = config.chunking.chunk_size,
        k = config.retrieval.k,
        "Configuration loaded"
    );

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
    };

    if result.is_ok() {
        tracing::info!("Command completed successfully");
    }
    result
}

/// The text printed to stderr for a failed run.
///
/// The full error goes to the log only; the terminal gets the user-facing
/// message, which never carries upstream bodies or key material.
fn failure_message(result: &AppResult<()>) -> Option<String> {
    let error = result.as_ref().err()?;
    tracing::error!(error = %error, "Command failed");
    Some(error.user_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use electro_core::{AppError, FailureKind};

    #[test]
    fn test_success_prints_nothing() {
        assert_eq!(failure_message(&Ok(())), None);
    }

    #[test]
    fn test_rejected_key_shows_only_user_message() {
        let error = AppError::LlmInvocation {
            kind: FailureKind::Permanent,
            message: "Chat completions API error (401 Unauthorized): Incorrect API key provided: sk-abc123"
                .to_string(),
        };
        let expected = error.user_message();

        let message = failure_message(&Err(error)).unwrap();

        assert_eq!(message, expected);
        assert!(!message.contains("sk-"));
        assert!(!message.contains("401"));
    }

    #[test]
    fn test_config_error_shows_only_user_message() {
        let error = AppError::Config("OPENAI_API_KEY is not set".to_string());

        let message = failure_message(&Err(error)).unwrap();

        assert!(!message.contains("OPENAI_API_KEY"));
        assert!(message.contains("misconfigured"));
    }
}
