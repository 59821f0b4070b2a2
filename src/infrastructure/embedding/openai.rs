use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;
use tokio::sync::OnceCell;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::{EmbeddingConfig, Secret, DEFAULT_OPENAI_EMBED_MODEL};

const MAX_BATCH: usize = 512;

/// OpenAI embeddings through `rig`.
///
/// The client is built from the configured key on first use and reused for
/// the life of the process.
pub struct OpenAiEmbedding {
    model: String,
    api_key: Secret,
    client: OnceCell<openai::Client>,
}

impl OpenAiEmbedding {
    pub fn new(api_key: Secret) -> Self {
        Self {
            model: DEFAULT_OPENAI_EMBED_MODEL.to_string(),
            api_key,
            client: OnceCell::new(),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.api_key.clone()).with_model(&config.model)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn client(&self) -> Result<&openai::Client, DomainError> {
        self.client
            .get_or_try_init(|| async {
                if self.api_key.expose().is_empty() {
                    return Err(DomainError::config("OpenAI embedding backend has no API key"));
                }
                openai::Client::new(self.api_key.expose())
                    .map_err(|e| DomainError::config(format!("cannot build OpenAI client: {e}")))
            })
            .await
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::internal("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.client().await?.embedding_model(&self.model);
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            let embeddings = model
                .embed_texts(batch.iter().map(|t| t.to_string()).collect::<Vec<_>>())
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;

            if embeddings.len() != batch.len() {
                return Err(DomainError::external(format!(
                    "embedding backend returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            out.extend(embeddings.into_iter().map(|emb| {
                let vec_f32: Vec<f32> = emb.vec.into_iter().map(|x| x as f32).collect();
                Embedding::new(vec_f32)
            }));
        }

        Ok(out)
    }
}
