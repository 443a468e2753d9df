//! Study RAG pipeline: folder indexing, retrieval and study artifact generation
//!
//! `RagPipeline` owns the storage, loader, embedding and LLM seams and is
//! shared by every request handler. It holds no per-request state; the only
//! mutable state is the index cache inside `IndexStore`.

use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{RagConfig, StorageBackend};
use crate::error::{Error, Result};
use crate::generation::{
    next_paper_timestamp, paper_filename, paper_path, parse_legacy_filename, parse_mcqs, render_paper, sidecar_path,
    strip_think, PromptBuilder,
};
use crate::ingestion::{DocumentLoader, PdfLoader, TextChunker};
use crate::providers::{build_embedder, build_llm, EmbeddingProvider, LlmProvider};
use crate::retrieval::{DocumentSummary, FolderIndex, IndexEntry, IndexHeader, IndexStore, RetrievalMode, INDEX_FORMAT_VERSION};
use crate::storage::{BlobStore, LocalBlobStore, SupabaseBlobStore, WriteMode, WriteOutcome};
use crate::types::api::{SkippedDocument, SourceRef};
use crate::types::folder::{papers_prefix, validate_segment, PAPERS_DIR};
use crate::types::study::validate_mcq_count;
use crate::types::{Chunk, FolderKey, FolderMarker, Mcq, PaperArtifact, PaperMetadata, PaperPreset, PaperSummary, ScoredChunk};

/// Attempts at finding an unused paper path before giving up
const MAX_PAPER_NAME_ATTEMPTS: usize = 5;

/// Outcome of indexing a folder
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub key: FolderKey,
    /// Documents that contributed at least one chunk
    pub files_processed: usize,
    pub chunks_created: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// A grounded answer with the passages it was built from
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Health of each external dependency
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Readiness {
    pub storage: bool,
    pub embedder: bool,
    pub llm: bool,
}

impl Readiness {
    /// Generation needs both model backends; storage is reported only
    pub fn is_ready(&self) -> bool {
        self.embedder && self.llm
    }
}

/// Orchestrates ingestion, retrieval and generation
pub struct RagPipeline {
    config: RagConfig,
    blobs: Arc<dyn BlobStore>,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    indexes: IndexStore,
    chunker: TextChunker,
}

impl RagPipeline {
    /// Assemble a pipeline from explicit components
    pub fn new(
        config: RagConfig,
        blobs: Arc<dyn BlobStore>,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let indexes = IndexStore::with_capacity(&config.storage.index_root, config.storage.index_cache_capacity)?;
        let chunker = TextChunker::from_config(&config.chunking);
        Ok(Self {
            config,
            blobs,
            loader,
            embedder,
            llm,
            indexes,
            chunker,
        })
    }

    /// Build every component from configuration
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let blobs: Arc<dyn BlobStore> = match config.storage.backend {
            StorageBackend::Local => Arc::new(LocalBlobStore::new(&config.storage.local_root)?),
            StorageBackend::Supabase => Arc::new(SupabaseBlobStore::new(&config.storage.supabase)?),
        };
        tracing::info!("Blob store: {}", blobs.name());

        let loader: Arc<dyn DocumentLoader> = Arc::new(PdfLoader::new(&config.ingestion));
        let embedder = build_embedder(&config.embeddings)?;
        let llm = build_llm(&config.llm)?;

        Self::new(config, blobs, loader, embedder, llm)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// (Re)build and persist the vector index for a folder.
    ///
    /// Documents that fail to parse or carry no text are skipped and
    /// reported. A storage failure aborts the whole run, leaving any previous
    /// index in place.
    pub async fn index_folder(&self, key: &FolderKey) -> Result<IndexReport> {
        let start = Instant::now();
        let entries = self.blobs.list(&key.blob_prefix()).await?;
        let pdfs: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_file() && e.name.to_lowercase().ends_with(".pdf"))
            .map(|e| e.name)
            .collect();

        if pdfs.is_empty() {
            return Err(Error::not_found(format!("No PDF files found in folder '{}'", key.folder)));
        }
        tracing::info!("Indexing {} ({} PDFs)", key, pdfs.len());

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut documents = Vec::new();
        let mut skipped = Vec::new();

        for filename in &pdfs {
            let data = self.blobs.download(&key.blob_path(filename)).await?;
            tracing::debug!("Downloaded {} ({} bytes)", filename, data.len());

            let loaded = AssertUnwindSafe(self.loader.load(filename, data))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::file_parse(filename, "loader panicked")));
            let doc = match loaded {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", filename, e);
                    skipped.push(SkippedDocument {
                        filename: filename.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let page_count = doc.page_count();
            let content_hash = doc.content_hash.clone();
            let chunker = self.chunker.clone();
            let doc_chunks = tokio::task::spawn_blocking(move || chunker.chunk_document(&doc))
                .await
                .map_err(|e| Error::internal(format!("Chunking task failed: {}", e)))?;

            if doc_chunks.is_empty() {
                tracing::warn!("Skipping {}: no extractable text", filename);
                skipped.push(SkippedDocument {
                    filename: filename.clone(),
                    error: "no extractable text".to_string(),
                });
                continue;
            }

            documents.push(DocumentSummary {
                filename: filename.clone(),
                content_hash,
                page_count,
                chunk_count: doc_chunks.len() as u32,
            });
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Err(Error::NoExtractableText {
                folder: key.folder.clone(),
                skipped: skipped
                    .iter()
                    .map(|s| format!("{}: {}", s.filename, s.error))
                    .collect(),
            });
        }

        let embeddings = self.embed_chunks(&chunks).await?;
        let dimensions = embeddings
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dimensions());
        if dimensions != self.embedder.dimensions() {
            tracing::warn!(
                "{} returned {}-dimensional vectors, configured for {}",
                self.embedder.name(),
                dimensions,
                self.embedder.dimensions()
            );
        }
        let header = IndexHeader {
            format_version: INDEX_FORMAT_VERSION,
            user_id: key.user_id.clone(),
            folder: key.folder.clone(),
            embedding_model: self.config.embeddings.model.clone(),
            dimensions,
            built_at: Utc::now(),
            documents,
        };
        let files_processed = header.documents.len();
        let chunks_created = chunks.len();

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        let index = FolderIndex::new(header, entries)?;
        self.indexes.save(key, index).await?;

        tracing::info!(
            "Indexed {}: {} files, {} chunks, {} skipped in {:.1}s",
            key,
            files_processed,
            chunks_created,
            skipped.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(IndexReport {
            key: key.clone(),
            files_processed,
            chunks_created,
            skipped,
        })
    }

    /// Embed chunk texts in batches, a bounded number of batches at a time
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batch_size = self.config.embeddings.batch_size.max(1);
        let concurrency = self.config.embeddings.concurrency.max(1);
        let embedder = &self.embedder;

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(batch_size).map(<[String]>::to_vec))
            .map(|batch: Vec<String>| async move {
                tracing::debug!("Embedding batch of {}", batch.len());
                embedder.embed_batch(&batch).await
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    /// Retrieve passages from a folder's index.
    ///
    /// An index built with a different embedding model is treated as missing;
    /// the folder has to be re-indexed.
    pub async fn retrieve(&self, key: &FolderKey, query: &str, mode: RetrievalMode) -> Result<Vec<ScoredChunk>> {
        let index = self.indexes.load(key).await?;
        let built_with = &index.header().embedding_model;
        if *built_with != self.config.embeddings.model {
            tracing::warn!(
                "Index for {} was built with {}, current model is {}; re-index required",
                key,
                built_with,
                self.config.embeddings.model
            );
            return Err(Error::FolderNotIndexed(key.folder.clone()));
        }
        if index.is_empty() || mode.k() == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        tokio::task::spawn_blocking(move || index.retrieve(&query_embedding, mode))
            .await
            .map_err(|e| Error::internal(format!("Retrieval task failed: {}", e)))?
    }

    fn diverse(&self, k: usize) -> RetrievalMode {
        RetrievalMode::Diverse {
            k,
            fetch_k: k * self.config.retrieval.fetch_multiplier,
            lambda: self.config.retrieval.mmr_lambda,
        }
    }

    /// Answer a question from the folder's documents
    pub async fn answer(&self, key: &FolderKey, question: &str) -> Result<ChatAnswer> {
        if question.trim().is_empty() {
            return Err(Error::invalid_input("query must not be empty"));
        }

        let mode = RetrievalMode::Similarity { k: self.config.retrieval.chat_top_k };
        let passages = self.retrieve(key, question, mode).await?;
        if passages.is_empty() {
            return Err(Error::not_found(format!("No indexed content in folder '{}'", key.folder)));
        }

        let context = PromptBuilder::build_context(&passages, self.config.generation.max_context_chars);
        let prompt = PromptBuilder::chat_prompt(question, &context.text);
        tracing::info!("Answering question for {} with {} passages", key, context.used);

        let raw = self.llm.complete(&prompt).await?;
        let answer = strip_think(&raw);

        let mut seen = HashSet::new();
        let sources = passages[..context.used]
            .iter()
            .filter(|p| seen.insert((p.chunk.source.filename.clone(), p.chunk.source.page_number)))
            .map(|p| SourceRef {
                filename: p.chunk.source.filename.clone(),
                page: p.chunk.source.page_number,
            })
            .collect();

        Ok(ChatAnswer { answer, sources })
    }

    /// Generate `count` multiple-choice questions from a folder
    pub async fn generate_mcqs(&self, key: &FolderKey, count: usize) -> Result<Vec<Mcq>> {
        validate_mcq_count(count)?;

        let query = &self.config.generation.study_query;
        let passages = self.retrieve(key, query, self.diverse(count * 2)).await?;
        if passages.is_empty() {
            return Err(Error::not_found(format!("No indexed content in folder '{}'", key.folder)));
        }

        let context = PromptBuilder::build_context(&passages, self.config.generation.max_context_chars);
        let prompt = PromptBuilder::mcq_prompt(count, &context.text);
        tracing::info!("Generating {} MCQs for {} from {} passages", count, key, context.used);

        let raw = self.llm.complete(&prompt).await?;
        let questions = parse_mcqs(&raw, count)?;
        if questions.len() < count {
            tracing::warn!("Model returned {} of {} requested MCQs", questions.len(), count);
        }
        Ok(questions)
    }

    /// Generate an exam paper and store it as an immutable artifact
    pub async fn generate_paper(&self, key: &FolderKey, marks: u32) -> Result<PaperArtifact> {
        let preset = PaperPreset::from_marks(marks)?;

        let query = &self.config.generation.study_query;
        let passages = self.retrieve(key, query, self.diverse(preset.candidate_count())).await?;
        if passages.is_empty() {
            return Err(Error::not_found(format!("No indexed content in folder '{}'", key.folder)));
        }

        let context = PromptBuilder::build_context(&passages, self.config.generation.max_context_chars);
        let prompt = PromptBuilder::paper_prompt(preset, &key.folder, &context.text);
        tracing::info!("Generating {}-mark paper for {} from {} passages", marks, key, context.used);

        let body = strip_think(&self.llm.complete(&prompt).await?);

        let mut previous = None;
        for _ in 0..MAX_PAPER_NAME_ATTEMPTS {
            let created_at = next_paper_timestamp(previous);
            previous = Some(created_at);
            let filename = paper_filename(&key.folder, marks, created_at);
            let path = paper_path(&key.user_id, &filename);
            let text = render_paper(preset, &key.folder, &body, created_at);

            let outcome = self
                .blobs
                .upload(&path, Bytes::from(text), "text/plain; charset=utf-8", WriteMode::CreateNew)
                .await?;
            if outcome == WriteOutcome::AlreadyExists {
                tracing::debug!("Paper path {} taken, resampling timestamp", path);
                continue;
            }

            let metadata = PaperMetadata {
                folder: key.folder.clone(),
                marks,
                filename,
                duration_minutes: preset.duration_minutes(),
                created_at,
            };
            let sidecar = serde_json::to_vec(&metadata)?;
            if let Err(e) = self
                .blobs
                .upload(&sidecar_path(&path), Bytes::from(sidecar), "application/json", WriteMode::Overwrite)
                .await
            {
                // Listing falls back to the file name
                tracing::warn!("Failed to store metadata for {}: {}", path, e);
            }

            let url = self.blobs.access_url(&path).await?;
            tracing::info!("Stored paper {}", path);
            return Ok(PaperArtifact { path, url, metadata });
        }

        Err(Error::storage(format!(
            "Could not find a free paper name for '{}' after {} attempts",
            key.folder, MAX_PAPER_NAME_ATTEMPTS
        )))
    }

    /// Folder names owned by a user, excluding the papers directory
    pub async fn list_folders(&self, user_id: &str) -> Result<Vec<String>> {
        validate_segment("user id", user_id)?;
        let mut folders: Vec<String> = self
            .blobs
            .list(&format!("{}/", user_id))
            .await?
            .into_iter()
            .filter(|e| e.is_dir && e.name != PAPERS_DIR)
            .map(|e| e.name)
            .collect();
        folders.sort();
        Ok(folders)
    }

    /// Previously generated papers, newest first
    pub async fn list_papers(&self, user_id: &str) -> Result<Vec<PaperSummary>> {
        validate_segment("user id", user_id)?;
        let prefix = papers_prefix(user_id);
        let entries = self.blobs.list(&prefix).await?;
        let names: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        let mut papers = Vec::new();
        for entry in entries.iter().filter(|e| e.is_file() && e.name.ends_with(".txt")) {
            let path = format!("{}{}", prefix, entry.name);
            let sidecar = sidecar_path(&entry.name);

            let metadata = if names.contains(sidecar.as_str()) {
                self.read_sidecar(&sidecar_path(&path)).await
            } else {
                None
            };

            let (folder, marks, created_at) = match metadata {
                Some(m) => (m.folder, m.marks, m.created_at),
                None => match parse_legacy_filename(&entry.name) {
                    Some(legacy) => (legacy.folder, legacy.marks, legacy.created_at),
                    None => {
                        tracing::debug!("Ignoring unrecognised paper entry {}", entry.name);
                        continue;
                    }
                },
            };

            papers.push(PaperSummary {
                filename: entry.name.clone(),
                folder,
                marks,
                path,
                created_at,
                size: entry.size.unwrap_or(0),
            });
        }

        papers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.filename.cmp(&a.filename)));
        Ok(papers)
    }

    async fn read_sidecar(&self, path: &str) -> Option<PaperMetadata> {
        let bytes = match self.blobs.download(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Unreadable paper metadata {}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!("Invalid paper metadata {}: {}", path, e);
                None
            }
        }
    }

    /// Make sure a folder exists by writing its marker object
    pub async fn ensure_folder(&self, key: &FolderKey) -> Result<FolderMarker> {
        let outcome = self
            .blobs
            .upload(&key.marker_path(), Bytes::new(), "text/plain", WriteMode::CreateNew)
            .await?;
        Ok(match outcome {
            WriteOutcome::Written => {
                tracing::info!("Created folder {}", key);
                FolderMarker::Created
            }
            WriteOutcome::AlreadyExists => FolderMarker::AlreadyExists,
        })
    }

    /// Store a PDF in a folder, replacing any file with the same name
    pub async fn upload_document(&self, key: &FolderKey, filename: &str, data: Bytes) -> Result<String> {
        let filename = filename.trim();
        validate_segment("filename", filename)?;
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(Error::invalid_input(format!("Only PDF files are accepted, got '{}'", filename)));
        }
        if data.is_empty() {
            return Err(Error::invalid_input(format!("File '{}' is empty", filename)));
        }

        let path = key.blob_path(filename);
        self.blobs
            .upload(&path, data, "application/pdf", WriteMode::Overwrite)
            .await?;
        tracing::info!("Uploaded {}", path);
        Ok(path)
    }

    /// Check every external dependency
    pub async fn readiness(&self) -> Readiness {
        let (storage, embedder, llm) = tokio::join!(
            self.blobs.health_check(),
            self.embedder.health_check(),
            self.llm.health_check()
        );
        Readiness {
            storage: storage.unwrap_or(false),
            embedder: embedder.unwrap_or(false),
            llm: llm.unwrap_or(false),
        }
    }
}
