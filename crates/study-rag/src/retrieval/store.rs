//! On-disk persistence and caching of folder indexes
//!
//! Indexes live at `{root}/{user_id}/{folder}.idx`, bincode-encoded. Writes
//! go to a temp file in the same directory, are fsynced, then renamed over
//! the previous artifact, so a reader sees either the old or the new index.
//!
//! The disk artifact is authoritative. Every load stats it and only serves
//! the cached copy while the artifact's modification time and size are
//! unchanged, so a rebuild by another process is picked up on the next query.

use dashmap::DashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::types::FolderKey;

use super::index::{FolderIndex, INDEX_FORMAT_VERSION};

const INDEX_EXTENSION: &str = "idx";

/// Default number of folder indexes kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Identity of an artifact on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

struct CachedIndex {
    index: Arc<FolderIndex>,
    fingerprint: Fingerprint,
    last_used: AtomicU64,
}

/// Persistent store for folder indexes with a bounded in-process cache
pub struct IndexStore {
    root: PathBuf,
    cache: DashMap<(String, String), CachedIndex>,
    capacity: usize,
    clock: AtomicU64,
}

impl IndexStore {
    /// Create a store rooted at `root`, creating the directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a store that caches at most `capacity` indexes
    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            cache: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        })
    }

    /// Path of the index artifact for a folder
    pub fn index_path(&self, key: &FolderKey) -> PathBuf {
        self.root
            .join(&key.user_id)
            .join(format!("{}.{}", key.folder, INDEX_EXTENSION))
    }

    /// Persist an index atomically, then publish it to the cache
    pub async fn save(&self, key: &FolderKey, index: FolderIndex) -> Result<Arc<FolderIndex>> {
        let path = self.index_path(key);
        let index = Arc::new(index);

        let to_write = Arc::clone(&index);
        let (bytes_written, fingerprint) = tokio::task::spawn_blocking(move || write_atomic(&path, &to_write))
            .await
            .map_err(|e| Error::internal(format!("Index write task failed: {}", e)))??;

        tracing::info!(
            "Persisted index for {} ({} chunks, {} bytes)",
            key,
            index.len(),
            bytes_written
        );
        self.publish(key, Arc::clone(&index), fingerprint);
        Ok(index)
    }

    /// Load a folder's index, from the cache while the artifact is unchanged.
    ///
    /// A folder without an artifact is `Error::FolderNotIndexed`.
    pub async fn load(&self, key: &FolderKey) -> Result<Arc<FolderIndex>> {
        let path = self.index_path(key);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.cache.remove(&cache_key(key));
                return Err(Error::FolderNotIndexed(key.folder.clone()));
            }
            Err(e) => return Err(Error::vector_index(format!("Failed to stat {}: {}", path.display(), e))),
        };
        let fingerprint = Fingerprint::of(&metadata);

        if let Some(cached) = self.cache.get(&cache_key(key)) {
            if cached.fingerprint == fingerprint {
                cached.last_used.store(self.tick(), Ordering::Relaxed);
                return Ok(Arc::clone(&cached.index));
            }
            tracing::debug!("Index for {} changed on disk, reloading", key);
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.cache.remove(&cache_key(key));
                return Err(Error::FolderNotIndexed(key.folder.clone()));
            }
            Err(e) => return Err(Error::vector_index(format!("Failed to read {}: {}", path.display(), e))),
        };

        let index = tokio::task::spawn_blocking(move || decode(&bytes))
            .await
            .map_err(|e| Error::internal(format!("Index decode task failed: {}", e)))??;
        let index = Arc::new(index);

        tracing::debug!("Loaded index for {} from {}", key, path.display());
        self.publish(key, Arc::clone(&index), fingerprint);
        Ok(index)
    }

    /// Number of indexes currently held in memory
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, key: &FolderKey, index: Arc<FolderIndex>, fingerprint: Fingerprint) {
        let entry = CachedIndex {
            index,
            fingerprint,
            last_used: AtomicU64::new(self.tick()),
        };
        self.cache.insert(cache_key(key), entry);

        while self.cache.len() > self.capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|e| e.value().last_used.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match oldest {
                Some(oldest) => {
                    tracing::debug!("Dropping cached index for {}/{}", oldest.0, oldest.1);
                    self.cache.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

fn cache_key(key: &FolderKey) -> (String, String) {
    (key.user_id.clone(), key.folder.clone())
}

fn write_atomic(path: &Path, index: &FolderIndex) -> Result<(usize, Fingerprint)> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::vector_index(format!("Index path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let bytes = bincode::serde::encode_to_vec(index, bincode::config::standard())
        .map_err(|e| Error::vector_index(format!("Failed to encode index: {}", e)))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    let file = temp
        .persist(path)
        .map_err(|e| Error::vector_index(format!("Failed to replace {}: {}", path.display(), e)))?;
    let fingerprint = Fingerprint::of(&file.metadata()?);

    Ok((bytes.len(), fingerprint))
}

fn decode(bytes: &[u8]) -> Result<FolderIndex> {
    let (index, _): (FolderIndex, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| Error::vector_index(format!("Corrupt index: {}", e)))?;

    let version = index.header().format_version;
    if version != INDEX_FORMAT_VERSION {
        return Err(Error::vector_index(format!(
            "Index format {} is not supported (expected {}); re-index the folder",
            version, INDEX_FORMAT_VERSION
        )));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::index::tests::test_index;

    fn key() -> FolderKey {
        FolderKey::new("user-1", "ML").unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_returns_same_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path()).unwrap();
        let index = test_index(&[vec![0.2, 0.9], vec![0.8, 0.3], vec![0.5, 0.5], vec![1.0, 0.1]]);
        let query = [0.9, 0.2];
        let before = index.search(&query, 3).unwrap();
        let diverse_before = index.search_diverse(&query, 2, 4, 0.5).unwrap();

        store.save(&key(), index).await.unwrap();

        // Fresh store: forces a disk read
        let reopened = IndexStore::new(dir.path()).unwrap();
        let loaded = reopened.load(&key()).await.unwrap();

        assert_eq!(loaded.search(&query, 3).unwrap(), before);
        assert_eq!(loaded.search_diverse(&query, 2, 4, 0.5).unwrap(), diverse_before);
        assert_eq!(loaded.header().folder, "ML");
    }

    #[tokio::test]
    async fn test_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path()).unwrap();
        let err = store.load(&key()).await.unwrap_err();
        assert!(matches!(err, Error::FolderNotIndexed(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_save_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path()).unwrap();

        store.save(&key(), test_index(&[vec![1.0, 0.0]])).await.unwrap();
        store
            .save(&key(), test_index(&[vec![1.0, 0.0], vec![0.0, 1.0]]))
            .await
            .unwrap();

        assert_eq!(store.load(&key()).await.unwrap().len(), 2);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("user-1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["ML.idx".to_string()]);
    }

    #[tokio::test]
    async fn test_rebuild_by_another_store_is_seen() {
        let dir = tempfile::tempdir().unwrap();
        let serving = IndexStore::new(dir.path()).unwrap();
        let rebuilding = IndexStore::new(dir.path()).unwrap();

        serving.save(&key(), test_index(&[vec![1.0, 0.0]])).await.unwrap();
        assert_eq!(serving.load(&key()).await.unwrap().len(), 1);

        rebuilding
            .save(&key(), test_index(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]))
            .await
            .unwrap();
        assert_eq!(serving.load(&key()).await.unwrap().len(), 3);

        std::fs::remove_file(serving.index_path(&key())).unwrap();
        let err = serving.load(&key()).await.unwrap_err();
        assert!(matches!(err, Error::FolderNotIndexed(_)));
        assert_eq!(serving.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_cache_drops_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::with_capacity(dir.path(), 2).unwrap();
        let keys: Vec<FolderKey> = ["A", "B", "C"]
            .iter()
            .map(|f| FolderKey::new("user-1", *f).unwrap())
            .collect();

        store.save(&keys[0], test_index(&[vec![1.0, 0.0]])).await.unwrap();
        store.save(&keys[1], test_index(&[vec![0.0, 1.0]])).await.unwrap();
        // Touch A so that B is the oldest
        store.load(&keys[0]).await.unwrap();
        store.save(&keys[2], test_index(&[vec![0.5, 0.5]])).await.unwrap();

        assert_eq!(store.cached_len(), 2);
        assert!(store.cache.contains_key(&cache_key(&keys[0])));
        assert!(!store.cache.contains_key(&cache_key(&keys[1])));

        // Dropped from memory, still on disk
        assert_eq!(store.load(&keys[1]).await.unwrap().len(), 1);
        assert_eq!(store.cached_len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path()).unwrap();
        let path = store.index_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        let err = store.load(&key()).await.unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));
    }
}
