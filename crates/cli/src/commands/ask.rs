//! Ask command handler.
//!
//! Processes the given datasheets and answers a single question.

use super::open_session;
use clap::Args;
use electro_core::{AppConfig, AppError, AppResult};
use electro_knowledge::AskOutcome;
use std::path::PathBuf;

/// Answer one question about a set of datasheets
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Datasheet files or directories (.pdf, .txt, .md)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// The question to ask
    #[arg(short, long)]
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(paths = self.paths.len(), "Executing ask command");

        let (mut session, report) = open_session(config, &self.paths).await?;
        let outcome = session.ask(&self.question).await?;

        if self.json {
            let output = serde_json::json!({
                "answer": outcome.answer,
                "retrievalQuestion": outcome.retrieval_question,
                "sources": outcome.sources,
                "index": {
                    "documents": report.documents,
                    "chunks": report.chunks,
                    "embedder": report.fingerprint.to_string(),
                },
            });

            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            print_outcome(&outcome, true);
        }

        Ok(())
    }
}

/// Print an answer, optionally followed by its sources.
pub(crate) fn print_outcome(outcome: &AskOutcome, with_sources: bool) {
    println!("{}", outcome.answer);

    if with_sources && !outcome.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in outcome.sources.iter().enumerate() {
            println!(
                "  [{}] {} #{} (score {:.3}): {}",
                i + 1,
                source.document,
                source.position,
                source.score,
                source.snippet
            );
        }
    }
}
