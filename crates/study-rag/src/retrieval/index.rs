//! Per-folder vector index with exact cosine search
//!
//! Entries keep their insertion order (document order, then chunk order), and
//! every search is a deterministic scan over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::{Chunk, ScoredChunk};

use super::mmr::{cosine_similarity, mmr_select, MmrCandidate};

/// Bumped whenever the persisted layout changes
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// How chunks are picked for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalMode {
    /// K nearest by cosine similarity
    Similarity { k: usize },
    /// `fetch_k` nearest, then `k` of those chosen by MMR
    Diverse { k: usize, fetch_k: usize, lambda: f32 },
}

impl RetrievalMode {
    pub fn k(&self) -> usize {
        match *self {
            RetrievalMode::Similarity { k } | RetrievalMode::Diverse { k, .. } => k,
        }
    }
}

/// Per-document line of the index header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub content_hash: String,
    pub page_count: u32,
    pub chunk_count: u32,
}

/// Metadata describing how and from what an index was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub format_version: u32,
    pub user_id: String,
    pub folder: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<DocumentSummary>,
}

/// One indexed chunk with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Vector index for one folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

impl FolderIndex {
    /// Assemble an index, checking every embedding against the header dimensions
    pub fn new(header: IndexHeader, entries: Vec<IndexEntry>) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != header.dimensions) {
            return Err(Error::vector_index(format!(
                "Chunk {} has {} dimensions, index expects {}",
                bad.chunk.id,
                bad.embedding.len(),
                header.dimensions
            )));
        }
        Ok(Self { header, entries })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retrieve chunks for a query embedding
    pub fn retrieve(&self, query: &[f32], mode: RetrievalMode) -> Result<Vec<ScoredChunk>> {
        match mode {
            RetrievalMode::Similarity { k } => self.search(query, k),
            RetrievalMode::Diverse { k, fetch_k, lambda } => self.search_diverse(query, k, fetch_k, lambda),
        }
    }

    /// K nearest chunks by cosine similarity, ties broken by insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self
            .ranked(query, k)?
            .into_iter()
            .map(|(idx, similarity)| self.scored(idx, similarity))
            .collect())
    }

    /// `fetch_k` nearest candidates re-ranked by MMR down to `k`
    pub fn search_diverse(&self, query: &[f32], k: usize, fetch_k: usize, lambda: f32) -> Result<Vec<ScoredChunk>> {
        let ranked = self.ranked(query, fetch_k.max(k))?;
        let candidates: Vec<MmrCandidate<'_>> = ranked
            .iter()
            .map(|&(idx, relevance)| MmrCandidate {
                id: idx,
                relevance,
                vector: &self.entries[idx].embedding,
            })
            .collect();

        let similarity_of = |idx: usize| {
            ranked
                .iter()
                .find(|(i, _)| *i == idx)
                .map(|(_, s)| *s)
                .unwrap_or_default()
        };

        Ok(mmr_select(&candidates, k, lambda)
            .into_iter()
            .map(|idx| self.scored(idx, similarity_of(idx)))
            .collect())
    }

    fn ranked(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.header.dimensions {
            return Err(Error::vector_index(format!(
                "Query has {} dimensions, index for '{}' has {}",
                query.len(),
                self.header.folder,
                self.header.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn scored(&self, idx: usize, similarity: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: self.entries[idx].chunk.clone(),
            similarity,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ChunkSource;

    pub(crate) fn test_index(vectors: &[Vec<f32>]) -> FolderIndex {
        let dims = vectors.first().map(Vec::len).unwrap_or(2);
        let entries = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| IndexEntry {
                chunk: Chunk::new(
                    format!("chunk {}", i),
                    ChunkSource::pdf("notes.pdf", 1, 1),
                    0,
                    7,
                    i as u32,
                ),
                embedding: v.clone(),
            })
            .collect();
        let header = IndexHeader {
            format_version: INDEX_FORMAT_VERSION,
            user_id: "user-1".to_string(),
            folder: "ML".to_string(),
            embedding_model: "test".to_string(),
            dimensions: dims,
            built_at: Utc::now(),
            documents: vec![DocumentSummary {
                filename: "notes.pdf".to_string(),
                content_hash: "abc".to_string(),
                page_count: 1,
                chunk_count: vectors.len() as u32,
            }],
        };
        FolderIndex::new(header, entries).unwrap()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = test_index(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]]);
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        let contents: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 1", "chunk 2"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = test_index(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<_> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = test_index(&[vec![1.0, 0.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = test_index(&[vec![1.0, 0.0]]);
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));
    }

    #[test]
    fn test_new_rejects_ragged_embeddings() {
        let index = test_index(&[vec![1.0, 0.0]]);
        let mut entries = index.entries().to_vec();
        entries[0].embedding.push(0.5);
        assert!(FolderIndex::new(index.header().clone(), entries).is_err());
    }

    #[test]
    fn test_diverse_prefers_spread() {
        let index = test_index(&[
            vec![1.0, 0.0],
            vec![1.0, 0.01],
            vec![0.99, 0.02],
            vec![0.6, 0.8],
        ]);
        let results = index.search_diverse(&[1.0, 0.3], 2, 4, 0.5).unwrap();
        let picked: Vec<_> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(picked, vec![2, 3]);
        assert!((results[1].similarity - 0.8046).abs() < 1e-3);
    }
}
