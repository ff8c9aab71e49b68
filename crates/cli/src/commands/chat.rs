//! Interactive chat over a set of datasheets.

use super::ask::print_outcome;
use super::open_session;
use clap::Args;
use electro_core::{AppConfig, AppError, AppResult};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Chat about a set of datasheets
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Datasheet files or directories (.pdf, .txt, .md)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Hide the sources printed after each answer
    #[arg(long)]
    pub no_sources: bool,
}

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Reset,
    ToggleSources,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        "/sources" => Input::ToggleSources,
        command if command.starts_with('/') => Input::Unknown(command),
        question => Input::Question(question),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(paths = self.paths.len(), "Executing chat command");

        let (mut session, report) = open_session(config, &self.paths).await?;
        println!(
            "Indexed {} documents ({} chunks). Ask a question, or /reset, /sources, /quit.",
            report.documents, report.chunks
        );

        let mut show_sources = !self.no_sources;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Reset => {
                    session.reset_conversation();
                    println!("Conversation cleared.");
                }
                Input::ToggleSources => {
                    show_sources = !show_sources;
                    println!("Sources {}.", if show_sources { "shown" } else { "hidden" });
                }
                Input::Unknown(command) => {
                    println!("Unknown command {}. Use /reset, /sources or /quit.", command);
                }
                Input::Question(question) => match session.ask(question).await {
                    Ok(outcome) => {
                        print_outcome(&outcome, show_sources);
                        println!();
                    }
                    // The conversation continues after a failed question
                    Err(e) if recoverable(&e) => {
                        tracing::warn!(error = %e, "Question failed");
                        eprintln!("{}", e.user_message());
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(())
    }
}

fn recoverable(error: &AppError) -> bool {
    matches!(
        error,
        AppError::InvalidInput(_)
            | AppError::LlmInvocation { .. }
            | AppError::EmbeddingService { .. }
    )
}
