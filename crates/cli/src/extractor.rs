//! Text extraction for the documents named on the command line.
//!
//! Directories are walked recursively. PDFs go through `lopdf` page text
//! extraction; `.txt` and `.md` files are read as-is.

use anyhow::{bail, Context, Result};
use electro_knowledge::Document;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Documents extracted from a set of paths.
#[derive(Debug, Default)]
pub struct Extracted {
    pub documents: Vec<Document>,

    /// Files whose text could not be extracted, with the cause
    pub failures: Vec<(PathBuf, anyhow::Error)>,
}

/// Collect supported files under `paths` and extract their text.
///
/// A path that does not exist is an error; a file that fails to extract is
/// recorded in `failures` and the rest continue.
pub fn extract_paths(paths: &[PathBuf]) -> Result<Extracted> {
    let mut extracted = Extracted::default();

    for (file, id) in with_unique_ids(discover(paths)?) {
        match extract_file(&file) {
            Ok(text) => extracted.documents.push(Document::new(id, text)),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Text extraction failed");
                extracted.failures.push((file, e));
            }
        }
    }

    tracing::info!(
        documents = extracted.documents.len(),
        failures = extracted.failures.len(),
        "Extracted documents"
    );

    Ok(extracted)
}

/// Supported files under `paths`, each with its document id.
///
/// A file named directly is identified by its file name, a walked file by
/// its path relative to the directory that was walked.
fn discover(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.exists() {
            bail!("Path does not exist: {}", path.display());
        }

        if path.is_file() {
            files.push((path.clone(), file_name(path)));
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        files.extend(found.into_iter().map(|file| {
            let id = relative_id(path, &file);
            (file, id)
        }));
    }

    Ok(files)
}

/// Replace ids shared by several files with each file's full path.
fn with_unique_ids(files: Vec<(PathBuf, String)>) -> Vec<(PathBuf, String)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, id) in &files {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    let shared: HashSet<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.to_string())
        .collect();

    files
        .into_iter()
        .map(|(file, id)| {
            if shared.contains(&id) {
                let full = file.display().to_string();
                (file, full)
            } else {
                (file, id)
            }
        })
        .collect()
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn extract_file(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        extract_pdf(path)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    let pdf = lopdf::Document::load(path)
        .with_context(|| format!("Failed to open PDF {}", path.display()))?;

    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Ok(String::new());
    }

    pdf.extract_text(&pages)
        .with_context(|| format!("Failed to extract text from {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `file` relative to `root`, with `/` separators.
fn relative_id(root: &Path, file: &Path) -> String {
    match file.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file_name(file),
    }
}
