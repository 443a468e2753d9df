//! Blob store abstraction for per-user folder storage

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One entry directly under a listed prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Entry name relative to the listed prefix
    pub name: String,
    /// True for directory-like entries, false for files
    pub is_dir: bool,
    /// Size in bytes (files only)
    pub size: Option<u64>,
    /// Creation time, when the backend reports one
    pub created_at: Option<DateTime<Utc>>,
}

impl BlobEntry {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// How an upload treats an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace any existing object
    Overwrite,
    /// Leave an existing object untouched
    CreateNew,
}

/// What an upload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyExists,
}

/// Trait for blob storage
///
/// Paths are `/`-separated keys such as `user-1/ML/notes.pdf`.
///
/// Implementations:
/// - `LocalBlobStore`: Local filesystem
/// - `SupabaseBlobStore`: Supabase Storage REST API
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List entries directly under `prefix` (a missing prefix lists as empty)
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>>;

    /// Store an object
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        mode: WriteMode,
    ) -> Result<WriteOutcome>;

    /// Fetch an object; a missing object is `Error::NotFound`
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// URL through which a client can fetch the object
    async fn access_url(&self, path: &str) -> Result<String>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get store name for logging
    fn name(&self) -> &str;
}
