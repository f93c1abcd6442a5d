
use std::path::Path;
use tracing::{debug, info};

use crate::chunking::split_text;
use crate::config::Config;
use crate::ollama::OllamaClient;
use crate::store::{ChunkRecord, PortfolioStore};
use crate::{ColdreachError, Result};

/// Load a document's text, selecting the loader by file extension.
///
/// `.pdf` files go through PDF text extraction; everything else is read as
/// UTF-8 text. An unsupported extension is never a hard error on its own,
/// but unreadable bytes (corrupt PDF, binary garbage misnamed as text) are.
#[inline]
pub fn load_document(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let content = if is_pdf {
        debug!("Loading {:?} with the PDF extractor", path);
        pdf_extract::extract_text(path).map_err(|e| {
            ColdreachError::Ingestion(format!(
                "Failed to extract PDF text from {}: {}",
                path.display(),
                e
            ))
        })?
    } else {
        debug!("Loading {:?} as UTF-8 text", path);
        std::fs::read_to_string(path).map_err(|e| {
            ColdreachError::Ingestion(format!("Failed to read {}: {}", path.display(), e))
        })?
    };

    if content.trim().is_empty() {
        return Err(ColdreachError::EmptyDocument);
    }

    Ok(content)
}

/// Ingest a document file into the vector store at `store_path`.
///
/// The pipeline loads the file, splits it into chunks, embeds every chunk in
/// input order, and appends the results to the store (creating it on first
/// use). Existing entries in the store are preserved. Returns the number of
/// chunks created.
#[inline]
pub async fn ingest_file(
    config: &Config,
    client: &OllamaClient,
    file_path: &Path,
    store_path: &Path,
) -> Result<usize> {
    let content = load_document(file_path)?;

    let chunks = split_text(&content, &config.chunking);
    if chunks.is_empty() {
        return Err(ColdreachError::EmptyDocument);
    }
    debug!("Chunked {:?} into {} chunks", file_path, chunks.len());

    let vectors = client
        .embed_batch(&chunks)
        .map_err(|e| ColdreachError::Ingestion(format!("Failed to embed chunks: {}", e)))?;

    let source = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string());

    let records: Vec<ChunkRecord> = chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (content, vector))| ChunkRecord {
            content,
            source: source.clone(),
            chunk_index: index as u32,
            vector,
        })
        .collect();

    let store = PortfolioStore::open(store_path).await?;
    store.append(&records).await?;

    info!(
        "Ingested {:?} into {:?} ({} chunks)",
        file_path,
        store_path,
        records.len()
    );
    Ok(records.len())
}

/// Ingest raw portfolio text by staging it to a transient file.
///
/// The staging file lives under the configured staging directory and is
/// removed when this function returns, whether ingestion succeeded or not.
#[inline]
pub async fn ingest_text(
    config: &Config,
    client: &OllamaClient,
    text: &str,
    store_path: &Path,
) -> Result<usize> {
    let staging_dir = config.staging_dir();
    std::fs::create_dir_all(&staging_dir)?;

    // NamedTempFile removes the staging artifact on drop, on every path
    let staged = tempfile::Builder::new()
        .prefix("portfolio_")
        .suffix(".txt")
        .tempfile_in(&staging_dir)
        .map_err(|e| ColdreachError::Ingestion(format!("Failed to create staging file: {}", e)))?;

    std::fs::write(staged.path(), text)
        .map_err(|e| ColdreachError::Ingestion(format!("Failed to write staging file: {}", e)))?;

    ingest_file(config, client, staged.path(), store_path).await
}
