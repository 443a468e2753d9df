//! Chunk types with source tracking for prompt labels

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// File name inside the folder
    pub filename: String,
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Total pages in the document
    pub page_count: u32,
}

impl ChunkSource {
    /// Create source info for a PDF page
    pub fn pdf(filename: impl Into<String>, page_number: u32, page_count: u32) -> Self {
        Self {
            filename: filename.into(),
            page_number,
            page_count,
        }
    }

    /// Format source for display, e.g. `notes.pdf, Page 3`
    pub fn label(&self) -> String {
        format!("{}, Page {}", self.filename, self.page_number)
    }
}

/// A bounded passage of one page's extracted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Text content (trimmed)
    pub content: String,
    /// Source information
    pub source: ChunkSource,
    /// Byte span of `content` within the page text
    pub byte_start: usize,
    pub byte_end: usize,
    /// Chunk index within the document
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        content: String,
        source: ChunkSource,
        byte_start: usize,
        byte_end: usize,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            source,
            byte_start,
            byte_end,
            chunk_index,
        }
    }
}

/// A chunk returned by retrieval with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query (-1.0 to 1.0, higher is more similar)
    pub similarity: f32,
}
