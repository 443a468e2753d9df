//! Core types for the study RAG system

pub mod api;
pub mod document;
pub mod folder;
pub mod study;

pub use document::{Chunk, ChunkSource, ScoredChunk};
pub use folder::{FolderKey, FolderMarker};
pub use study::{Mcq, PaperArtifact, PaperMetadata, PaperPreset, PaperSummary};
