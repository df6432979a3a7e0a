//! Document loading: walk the documents directory and read plain-text
//! sources into immutable `Document`s, sorted by path so a rebuild over
//! unchanged files yields an identical corpus.

pub mod chunker;

use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::{Chunk, Document};

/// Read every supported file under `docs_dir`.
pub fn load_documents(docs_dir: &Path, max_bytes: u64) -> Result<Vec<Document>> {
    if !docs_dir.is_dir() {
        bail!("documents directory {} not found", docs_dir.display());
    }

    let mut found: Vec<(String, String)> = Vec::new();

    for entry in WalkDir::new(docs_dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();

        if !is_supported_file(path) {
            continue;
        }

        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() > max_bytes {
                tracing::warn!(
                    "Skipping {} ({} bytes, over the {max_bytes} byte limit)",
                    path.display(),
                    meta.len()
                );
                continue;
            }
        }

        let relative = path
            .strip_prefix(docs_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        match std::fs::read_to_string(path) {
            Ok(text) => found.push((relative, text)),
            Err(_) => {
                // Skip files that can't be read as UTF-8
                tracing::warn!("Skipping {}: not readable as UTF-8", path.display());
                continue;
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(found
        .into_iter()
        .map(|(source_path, raw_text)| Document {
            id: Uuid::new_v4(),
            source_path,
            raw_text,
            ingested_at: Utc::now(),
        })
        .collect())
}

/// Cut one document into indexable chunks.
pub fn chunk_document(doc: &Document, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    chunker::chunk_text(&doc.raw_text, max_chars, overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(i, window)| Chunk {
            id: Uuid::new_v4(),
            document_id: doc.id,
            sequence_index: i,
            text: window.text,
            char_span: window.span,
        })
        .collect()
}

/// Hidden files and directories are skipped; the walk root itself is exempt
/// so a dot-named documents directory still works.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_string_lossy()
            .starts_with('.')
}

fn is_supported_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    matches!(ext.as_str(), "md" | "markdown" | "txt" | "text")
}
