//! Local filesystem blob store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

use super::blob::{BlobEntry, BlobStore, WriteMode, WriteOutcome};

/// Blob store rooted at a local directory
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local blob store, creating the root directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve a blob path, refusing anything that would escape the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_matches('/'));
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(Error::invalid_input(format!("Invalid blob path: {}", path)));
            }
        }
        Ok(self.root.join(relative))
    }
}

fn system_time_to_utc(time: std::io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let dir = if prefix.trim_matches('/').is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(format!("Failed to list {}: {}", dir.display(), e))),
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // In-flight temp files from atomic writes
            if name.starts_with(".tmp") {
                continue;
            }
            let metadata = entry.metadata().await?;
            let is_dir = metadata.is_dir();
            listed.push(BlobEntry {
                name,
                is_dir,
                size: (!is_dir).then(|| metadata.len()),
                created_at: system_time_to_utc(metadata.created())
                    .or_else(|| system_time_to_utc(metadata.modified())),
            });
        }

        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        _content_type: &str,
        mode: WriteMode,
    ) -> Result<WriteOutcome> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match mode {
            WriteMode::Overwrite => {
                tokio::fs::write(&target, &data).await?;
                Ok(WriteOutcome::Written)
            }
            WriteMode::CreateNew => {
                let file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&target)
                    .await;
                match file {
                    Ok(mut file) => {
                        file.write_all(&data).await?;
                        file.flush().await?;
                        Ok(WriteOutcome::Written)
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(WriteOutcome::AlreadyExists),
                    Err(e) => Err(Error::storage(format!("Failed to create {}: {}", path, e))),
                }
            }
        }
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::not_found(format!("Blob not found: {}", path)))
            }
            Err(e) => Err(Error::storage(format!("Failed to read {}: {}", path, e))),
        }
    }

    async fn access_url(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        let absolute = if target.is_absolute() {
            target
        } else {
            std::env::current_dir()?.join(target)
        };
        Ok(format!("file://{}", absolute.display()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.exists())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}
