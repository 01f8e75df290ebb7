//! In-memory vector index over text chunks.
//!
//! Chunks are deduplicated by a SHA-256 fingerprint of `source` + `text`, so
//! re-ingesting the same document does not skew retrieval. Search is a
//! linear cosine-similarity scan.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, MarkdownSplitter};

use crate::error::AppError;

/// One retrievable piece of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Page URL, or `ingest` for raw text.
    pub source: String,
    /// Byte offset of the chunk in its source document.
    pub start_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(source: impl Into<String>, start_index: usize, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            source: source.into(),
            start_index,
            text: text.into(),
        }
    }

    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A chunk returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Split Markdown text into overlapping chunks of at most `size` characters.
///
/// Returns `(start_offset, text)` pairs; whitespace-only chunks are dropped.
pub fn split_markdown(text: &str, size: usize, overlap: usize) -> Result<Vec<(usize, String)>, AppError> {
    let config = ChunkConfig::new(size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Config(format!("rag: invalid chunk config: {e}")))?;
    let splitter = MarkdownSplitter::new(config);
    Ok(splitter
        .chunk_indices(text)
        .filter(|(_, t)| !t.trim().is_empty())
        .map(|(pos, t)| (pos, t.to_string()))
        .collect())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    fingerprints: HashSet<String>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add chunks with their embeddings. Returns how many were new.
    pub fn insert(&mut self, items: Vec<(Chunk, Vec<f32>)>) -> usize {
        let mut added = 0;
        for (chunk, embedding) in items {
            if self.fingerprints.insert(chunk.fingerprint()) {
                self.entries.push((chunk, embedding));
                added += 1;
            }
        }
        added
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn search_returns_top_k_descending() {
        let mut index = VectorIndex::new();
        index.insert(vec![
            (Chunk::new("a", 0, "east"), vec![1.0, 0.0]),
            (Chunk::new("b", 0, "north"), vec![0.0, 1.0]),
            (Chunk::new("c", 0, "north-east"), vec![0.7, 0.7]),
        ]);
        let hits = index.search(&[1.0, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "east");
        assert_eq!(hits[1].chunk.text, "north-east");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn duplicate_chunks_are_skipped() {
        let mut index = VectorIndex::new();
        assert_eq!(index.insert(vec![(Chunk::new("s", 0, "same"), vec![1.0])]), 1);
        assert_eq!(index.insert(vec![(Chunk::new("s", 10, "same"), vec![1.0])]), 0);
        assert_eq!(index.insert(vec![(Chunk::new("t", 0, "same"), vec![1.0])]), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn split_respects_size_and_offsets() {
        let text = "# Title\n\n".to_string() + &"word ".repeat(400);
        let chunks = split_markdown(&text, 100, 20).unwrap();
        assert!(chunks.len() > 1);
        for (start, chunk) in &chunks {
            assert!(chunk.chars().count() <= 100);
            assert_eq!(&text[*start..*start + chunk.len()], chunk);
        }
        assert!(chunks.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn overlap_above_size_is_rejected() {
        assert!(split_markdown("text", 10, 20).is_err());
    }
}
