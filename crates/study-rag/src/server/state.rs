//! Application state for the study server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::server::auth::TokenVerifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: RagPipeline,
    verifier: TokenVerifier,
}

impl AppState {
    /// Create state with every component built from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing study RAG state (storage: {:?}, embeddings: {:?}, llm: {:?})",
            config.storage.backend,
            config.embeddings.backend,
            config.llm.backend
        );
        let pipeline = RagPipeline::from_config(config)?;
        Ok(Self::from_pipeline(pipeline))
    }

    /// Wrap an already assembled pipeline
    pub fn from_pipeline(pipeline: RagPipeline) -> Self {
        let verifier = TokenVerifier::new(&pipeline.config().auth);
        Self {
            inner: Arc::new(AppStateInner { pipeline, verifier }),
        }
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.inner.pipeline
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.inner.verifier
    }

    pub fn config(&self) -> &RagConfig {
        self.inner.pipeline.config()
    }
}
