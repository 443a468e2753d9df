//! Configuration for the study RAG system
//!
//! Everything the pipeline needs is resolved once into a [`RagConfig`] at
//! startup and passed down explicitly. Secrets may come from the environment,
//! but only through [`RagConfig::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound for `max_retries`; backoff doubles per retry
pub const MAX_RETRIES: u32 = 10;

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Bearer token verification
    pub auth: AuthConfig,
    /// Blob store and index storage
    pub storage: StorageConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt and artifact generation
    pub generation: GenerationConfig,
    /// Document extraction
    pub ingestion: IngestionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply secrets and endpoints from environment variables.
    ///
    /// Called once at startup by the server binary.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("STUDY_RAG_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            self.embeddings.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.storage.supabase.url = url;
        }
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_KEY") {
            self.storage.supabase.service_key = key;
        }
    }

    /// Reject inconsistent settings before anything is constructed
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::Config("auth.jwt_secret must be set".to_string()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.chat_top_k == 0 {
            return Err(Error::Config("retrieval.chat_top_k must be positive".to_string()));
        }
        if self.retrieval.fetch_multiplier == 0 {
            return Err(Error::Config("retrieval.fetch_multiplier must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.retrieval.mmr_lambda) {
            return Err(Error::Config("retrieval.mmr_lambda must be within [0, 1]".to_string()));
        }
        if self.embeddings.max_retries > MAX_RETRIES || self.llm.max_retries > MAX_RETRIES {
            return Err(Error::Config(format!(
                "embeddings.max_retries and llm.max_retries must be at most {}",
                MAX_RETRIES
            )));
        }
        if self.storage.index_cache_capacity == 0 {
            return Err(Error::Config("storage.index_cache_capacity must be positive".to_string()));
        }
        if self.ingestion.max_concurrent_extractions == 0 {
            return Err(Error::Config("ingestion.max_concurrent_extractions must be positive".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".to_string()));
        }
        if self.storage.backend == StorageBackend::Supabase
            && (self.storage.supabase.url.is_empty() || self.storage.supabase.service_key.is_empty())
        {
            return Err(Error::Config(
                "Supabase storage selected but storage.supabase.url/service_key are missing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Bearer token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,
    /// Required `aud` claim, if any (Supabase issues "authenticated")
    pub audience: Option<String>,
    /// Allowed clock skew in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            audience: None,
            leeway_secs: 60,
        }
    }
}

/// Blob store backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem
    #[default]
    Local,
    /// Supabase Storage REST API
    Supabase,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which blob store holds documents and papers
    pub backend: StorageBackend,
    /// Root directory for the local blob store
    pub local_root: PathBuf,
    /// Root directory for persisted vector indexes
    pub index_root: PathBuf,
    /// Folder indexes kept in memory; least recently used are dropped first
    pub index_cache_capacity: usize,
    /// Supabase settings (used when backend = supabase)
    pub supabase: SupabaseConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("study-rag");

        Self {
            backend: StorageBackend::Local,
            local_root: data_dir.join("storage"),
            index_root: data_dir.join("indexes"),
            index_cache_capacity: 32,
            supabase: SupabaseConfig::default(),
        }
    }
}

/// Supabase Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Service role key
    pub service_key: String,
    /// Bucket holding user folders
    pub bucket: String,
    /// Lifetime of signed download URLs
    pub signed_url_expiry_secs: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            bucket: "folders".to_string(),
            signed_url_expiry_secs: 3600,
            timeout_secs: 60,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Google Generative Language API
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider
    pub backend: EmbeddingBackend,
    /// Model to use
    pub model: String,
    /// Expected embedding dimensions
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight at once
    pub concurrency: usize,
    /// API key (Gemini)
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Gemini,
            model: "models/gemini-embedding-001".to_string(),
            dimensions: 768,
            batch_size: 50,
            concurrency: 4,
            api_key: None,
            base_url: None,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// LLM backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Groq OpenAI-compatible chat completions
    #[default]
    Groq,
    /// Local Ollama server
    Ollama,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider
    pub backend: LlmBackend,
    /// Base URL (defaults per backend when unset)
    pub base_url: Option<String>,
    /// Generation model name
    pub model: String,
    /// API key (Groq)
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Cap on generated tokens
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Groq,
            base_url: None,
            model: "deepseek-r1-distill-llama-70b".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Maximum overlap between neighbouring chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved for chat answers
    pub chat_top_k: usize,
    /// Candidate pool size as a multiple of k for diversity-aware retrieval
    pub fetch_multiplier: usize,
    /// MMR balance: 1.0 = pure relevance, 0.0 = pure diversity
    pub mmr_lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chat_top_k: 6,
            fetch_multiplier: 4,
            mmr_lambda: 0.5,
        }
    }
}

/// Prompt and artifact generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Character budget for concatenated context passages
    pub max_context_chars: usize,
    /// Query used to sample study material for quizzes and papers
    pub study_query: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 12_000,
            study_query: "key concepts, definitions, processes and important facts".to_string(),
        }
    }
}

/// Document extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Timeout for extracting text from a single PDF
    pub extract_timeout_secs: u64,
    /// Directory for temporary files (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// Extractions allowed on the blocking pool at once, including timed-out ones still running
    pub max_concurrent_extractions: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            extract_timeout_secs: 60,
            scratch_dir: None,
            max_concurrent_extractions: 4,
        }
    }
}
