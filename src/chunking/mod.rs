
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for splitting portfolio text into embedding-ready chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Split text into fixed-size chunks with a fixed overlap between neighbors.
///
/// Chunks preserve the original text order and each consecutive pair shares
/// exactly `chunk_overlap` characters, except possibly the final chunk, which
/// may be shorter. Whitespace-only input yields no chunks. Windows advance on
/// `char` boundaries, so multi-byte text is never split mid-character.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let step = size.saturating_sub(config.chunk_overlap).max(1);

    // Byte offset of every char boundary, plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(total_chars);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == total_chars {
            break;
        }
        start += step;
    }

    debug!(
        "Split {} chars into {} chunks (size {}, overlap {})",
        total_chars,
        chunks.len(),
        size,
        config.chunk_overlap
    );

    chunks
}
