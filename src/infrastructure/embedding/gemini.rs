use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::{EmbeddingConfig, Secret, DEFAULT_EMBED_MODEL, GEMINI_BASE_URL};
use crate::infrastructure::gemini::{
    ensure_success, model_path, BatchEmbedRequest, BatchEmbedResponse, Content,
    EmbedContentRequest, API_KEY_HEADER, EMBED_API_VERSION,
};

/// Upper bound on texts per `batchEmbedContents` call.
const MAX_BATCH: usize = 100;

pub struct GeminiEmbedding {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Secret,
}

impl GeminiEmbedding {
    pub fn new(api_key: Secret) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.api_key.clone())
            .with_model(&config.model)
            .with_base_url(&config.base_url)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let model = model_path(&self.model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::text(text),
                })
                .collect(),
        };
        let url = format!(
            "{}/{}/{}:batchEmbedContents",
            self.base_url, EMBED_API_VERSION, model
        );

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::external(format!("embedding request failed: {e}")))?;

        let parsed: BatchEmbedResponse = ensure_success(&self.model, response)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::external(format!("invalid embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(DomainError::external(format!(
                "embedding backend returned {} vectors for {} texts",
                parsed.embeddings.len(),
                texts.len()
            )));
        }

        Ok(parsed
            .embeddings
            .into_iter()
            .map(|e| Embedding::new(e.values))
            .collect())
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_chunk(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::internal("No embedding returned"))
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            out.extend(self.embed_chunk(batch).await?);
            debug!(done = out.len(), "embedded batch");
        }
        Ok(out)
    }
}
