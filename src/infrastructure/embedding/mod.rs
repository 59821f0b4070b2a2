mod gemini;
mod local;
mod openai;

use std::sync::Arc;

use crate::domain::{ports::EmbeddingService, DomainError};
use crate::infrastructure::config::{EmbeddingBackend, EmbeddingConfig};

pub use gemini::GeminiEmbedding;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedding;
pub use local::match_model_code;
pub use openai::OpenAiEmbedding;

/// Builds the embedding backend selected in configuration.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>, DomainError> {
    match config.backend {
        EmbeddingBackend::Google => Ok(Arc::new(GeminiEmbedding::from_config(config))),
        EmbeddingBackend::OpenAi => Ok(Arc::new(OpenAiEmbedding::from_config(config))),
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedding::from_config(config))),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => Err(DomainError::config(
            "EMBED_BACKEND=local needs a build with the 'local-embeddings' feature",
        )),
    }
}
