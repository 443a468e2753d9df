//! Document ingestion: PDF text extraction and chunking

mod chunker;
mod loader;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use chunker::TextChunker;
pub use loader::{clean_text, extract_pages, hash_bytes, PageText, ParsedDocument, PdfLoader};

/// Turns raw document bytes into page text
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Extract pages from one document. Failures are per-document and carry the filename.
    async fn load(&self, filename: &str, data: Bytes) -> Result<ParsedDocument>;

    /// Get loader name for logging
    fn name(&self) -> &str;
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, filename: &str, data: Bytes) -> Result<ParsedDocument> {
        PdfLoader::load(self, filename, data).await
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
