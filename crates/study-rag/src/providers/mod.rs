//! Provider abstractions for embeddings and LLM completion
//!
//! Trait-based so the pipeline can switch between hosted (Gemini, Groq) and
//! local (Ollama) backends from configuration.

pub mod embedding;
pub mod gemini;
pub mod groq;
pub mod llm;
pub mod ollama;
pub mod retry;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmBackend, LlmConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiEmbedder;
pub use groq::GroqLlm;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use retry::RetryPolicy;

/// Build the configured embedding provider
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.backend {
        EmbeddingBackend::Gemini => Arc::new(GeminiEmbedder::new(config)?),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
    };
    tracing::info!(
        "Embedding provider: {} ({}, {} dims)",
        provider.name(),
        config.model,
        provider.dimensions()
    );
    Ok(provider)
}

/// Build the configured LLM provider
pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.backend {
        LlmBackend::Groq => Arc::new(GroqLlm::new(config)?),
        LlmBackend::Ollama => Arc::new(OllamaLlm::new(config)?),
    };
    tracing::info!("LLM provider: {} ({})", provider.name(), provider.model());
    Ok(provider)
}
