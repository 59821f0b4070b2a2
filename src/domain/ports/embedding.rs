use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

/// Short text embedded at startup to learn the backend's output dimension.
pub const DIMENSION_PROBE: &str = "_dim_probe_";

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;

    async fn probe_dimension(&self) -> Result<usize, DomainError> {
        Ok(self.embed(DIMENSION_PROBE).await?.dimension())
    }
}
