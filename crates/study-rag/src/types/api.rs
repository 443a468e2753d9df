//! HTTP request and response bodies

use serde::{Deserialize, Serialize};

use super::folder::FolderMarker;
use super::study::{Mcq, PaperArtifact, PaperSummary};

/// Body for endpoints that only name a folder
#[derive(Debug, Clone, Deserialize)]
pub struct FolderRequest {
    pub folder_name: String,
}

/// POST /chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub folder_name: String,
    #[serde(default)]
    pub query: String,
}

/// POST /generate_mcqs
#[derive(Debug, Clone, Deserialize)]
pub struct McqRequest {
    pub folder_name: String,
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
}

fn default_num_questions() -> usize {
    10
}

/// POST /generate_paper
#[derive(Debug, Clone, Deserialize)]
pub struct PaperRequest {
    pub folder_name: String,
    pub marks: u32,
}

/// A document that was skipped during indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub filename: String,
    pub error: String,
}

/// Result of indexing a folder
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub status: &'static str,
    pub folder: String,
    pub user_id: String,
    pub files_processed: usize,
    pub chunks_created: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// A passage the answer was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub filename: String,
    pub page: u32,
}

/// Chat answer
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub folder: String,
    pub user_id: String,
    pub sources: Vec<SourceRef>,
}

/// Folder listing
#[derive(Debug, Clone, Serialize)]
pub struct FoldersResponse {
    pub folders: Vec<String>,
    pub user_id: String,
}

/// Folder creation outcome
#[derive(Debug, Clone, Serialize)]
pub struct EnsureFolderResponse {
    pub folder: String,
    pub outcome: FolderMarker,
}

/// Upload result
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub folder: String,
    pub uploaded: Vec<String>,
}

/// Generated quiz
#[derive(Debug, Clone, Serialize)]
pub struct McqResponse {
    pub questions: Vec<Mcq>,
    pub folder: String,
    pub total_questions: usize,
}

/// Generated paper
#[derive(Debug, Clone, Serialize)]
pub struct PaperResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub artifact: PaperArtifact,
}

/// Paper listing
#[derive(Debug, Clone, Serialize)]
pub struct PapersResponse {
    pub papers: Vec<PaperSummary>,
    pub user_id: String,
}
