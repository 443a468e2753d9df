//! study-rag: folder-scoped question answering, quizzes and exam papers over PDFs
//!
//! Users keep folders of PDFs in a blob store. A folder is indexed by
//! extracting page text, chunking it, embedding the chunks and persisting a
//! vector index. Questions, multiple-choice quizzes and exam papers are then
//! generated by an LLM from passages retrieved out of that index.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{ChatAnswer, IndexReport, RagPipeline, Readiness};
pub use types::{
    document::{Chunk, ChunkSource, ScoredChunk},
    folder::FolderKey,
    study::{Mcq, PaperArtifact, PaperPreset, PaperSummary},
};
