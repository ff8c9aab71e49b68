//! Command handlers for the ElectroGPT CLI.

pub mod ask;
pub mod chat;

pub use ask::AskCommand;
pub use chat::ChatCommand;

use crate::extractor;
use electro_core::{AppConfig, AppError, AppResult};
use electro_knowledge::{ProcessReport, Session};
use std::path::PathBuf;

/// Create a session and index the documents under `paths`.
///
/// Extraction failures and skipped documents are reported on stderr.
pub(crate) async fn open_session(
    config: &AppConfig,
    paths: &[PathBuf],
) -> AppResult<(Session, ProcessReport)> {
    let mut session = Session::new(config)?;

    let extracted = extractor::extract_paths(paths)
        .map_err(|e| AppError::Ingestion(format!("{:#}", e)))?;

    for (path, error) in &extracted.failures {
        eprintln!("Skipped {}: {:#}", path.display(), error);
    }

    let report = session.process(extracted.documents).await?;

    for skipped in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.document_id, skipped.reason);
    }

    tracing::info!(
        session = %session.id(),
        documents = report.documents,
        chunks = report.chunks,
        embedder = %report.fingerprint,
        "Documents processed"
    );

    Ok((session, report))
}
