//! Error types for the study RAG system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, invalid or expired bearer token
    Unauthenticated,
    /// Folder, index or content absent
    NotFound,
    /// Malformed request or out-of-range parameter
    InvalidInput,
    /// Embedding, LLM or storage failure, or unusable model output
    Upstream,
}

impl ErrorKind {
    /// HTTP status for this kind
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication failure
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Folder, document or content not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Folder has never been indexed
    #[error("Folder '{0}' has not been indexed yet")]
    FolderNotIndexed(String),

    /// Request validation failure
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every document in the folder was empty or unreadable
    #[error("No extractable text found in folder '{}'{}", .folder, format_skipped(.skipped))]
    NoExtractableText {
        folder: String,
        skipped: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Model output could not be parsed as the expected JSON
    #[error("Model output could not be parsed: {0}")]
    UnparseableOutput(String),

    /// Model output parsed but failed validation
    #[error("Model output failed validation: {0}")]
    InvalidOutput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_skipped(skipped: &[String]) -> String {
    if skipped.is_empty() {
        String::new()
    } else {
        format!(" (skipped: {})", skipped.join("; "))
    }
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Error::NotFound(_) | Error::FolderNotIndexed(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) | Error::NoExtractableText { .. } => ErrorKind::InvalidInput,
            Error::Config(_)
            | Error::FileParse { .. }
            | Error::Embedding(_)
            | Error::VectorIndex(_)
            | Error::Llm(_)
            | Error::Storage(_)
            | Error::UnparseableOutput(_)
            | Error::InvalidOutput(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::Internal(_) => ErrorKind::Upstream,
        }
    }

    /// Short machine-readable error type used in response bodies
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Unauthenticated(_) => "unauthenticated",
            Error::NotFound(_) => "not_found",
            Error::FolderNotIndexed(_) => "not_indexed",
            Error::InvalidInput(_) => "invalid_input",
            Error::NoExtractableText { .. } => "no_extractable_text",
            Error::Config(_) => "config_error",
            Error::FileParse { .. } => "parse_error",
            Error::Embedding(_) => "embedding_error",
            Error::VectorIndex(_) => "vector_index_error",
            Error::Llm(_) => "llm_error",
            Error::Storage(_) => "storage_error",
            Error::UnparseableOutput(_) => "unparseable_output",
            Error::InvalidOutput(_) => "invalid_output",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.kind().status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("{} ({})", message, self.error_type());
        } else {
            tracing::debug!("{} ({})", message, self.error_type());
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": message,
            },
            "detail": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::Unauthenticated("x".into()).kind().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::FolderNotIndexed("ml".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::NoExtractableText { folder: "ml".into(), skipped: vec![] }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(Error::UnparseableOutput("x".into()).kind(), ErrorKind::Upstream);
        assert_eq!(Error::InvalidOutput("x".into()).kind().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_no_text_message_lists_skipped() {
        let err = Error::NoExtractableText {
            folder: "ml".into(),
            skipped: vec!["scan.pdf: no text".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'ml'"));
        assert!(msg.contains("scan.pdf: no text"));
    }
}
