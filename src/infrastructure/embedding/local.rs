//! On-device embeddings through fastembed (ONNX Runtime).
//!
//! The model is loaded once, the first time it is needed (in practice the
//! startup dimension check), and shared afterwards. Loading and inference run
//! on the blocking pool.

/// Position in `codes` of the catalogue entry for `name`.
///
/// Exact codes win (case-insensitive). Otherwise the last path segment is
/// compared with any `-onnx` suffix dropped, so Hugging Face names such as
/// `sentence-transformers/all-MiniLM-L6-v2` find their ONNX export.
pub fn match_model_code(name: &str, codes: &[&str]) -> Option<usize> {
    let name = name.trim();
    if let Some(i) = codes.iter().position(|c| c.eq_ignore_ascii_case(name)) {
        return Some(i);
    }

    fn tail(code: &str) -> String {
        let lower = code.to_ascii_lowercase();
        lower
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches("-onnx")
            .to_string()
    }

    let wanted = tail(name);
    codes.iter().position(|c| tail(c) == wanted)
}

#[cfg(feature = "local-embeddings")]
pub use engine::LocalEmbedding;

#[cfg(feature = "local-embeddings")]
mod engine {
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{InitOptions, TextEmbedding};
    use tokio::sync::OnceCell;
    use tracing::{info, instrument};

    use super::match_model_code;
    use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
    use crate::infrastructure::config::{EmbeddingConfig, DEFAULT_LOCAL_EMBED_MODEL};

    const BATCH_SIZE: usize = 64;

    pub struct LocalEmbedding {
        model_name: String,
        cache_dir: Option<PathBuf>,
        model: OnceCell<Arc<TextEmbedding>>,
    }

    impl LocalEmbedding {
        pub fn new(model_name: impl Into<String>) -> Self {
            Self {
                model_name: model_name.into(),
                cache_dir: None,
                model: OnceCell::new(),
            }
        }

        pub fn from_config(config: &EmbeddingConfig) -> Self {
            let mut embedder = Self::new(&config.model);
            embedder.cache_dir = config.cache_dir.clone();
            embedder
        }

        pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.cache_dir = Some(dir.into());
            self
        }

        async fn model(&self) -> Result<Arc<TextEmbedding>, DomainError> {
            self.model
                .get_or_try_init(|| async {
                    let name = self.model_name.clone();
                    let cache_dir = self.cache_dir.clone();
                    let model = tokio::task::spawn_blocking(move || load(&name, cache_dir))
                        .await
                        .map_err(|e| DomainError::internal(format!("model loading task failed: {e}")))??;
                    info!(model = %self.model_name, "local embedding model loaded");
                    Ok(Arc::new(model))
                })
                .await
                .map(Arc::clone)
        }
    }

    impl Default for LocalEmbedding {
        fn default() -> Self {
            Self::new(DEFAULT_LOCAL_EMBED_MODEL)
        }
    }

    fn load(name: &str, cache_dir: Option<PathBuf>) -> Result<TextEmbedding, DomainError> {
        let catalogue = TextEmbedding::list_supported_models();
        let codes: Vec<&str> = catalogue.iter().map(|m| m.model_code.as_str()).collect();
        let entry = match_model_code(name, &codes)
            .and_then(|i| catalogue.get(i))
            .ok_or_else(|| DomainError::config(format!("unknown local embedding model '{name}'")))?;

        let mut options =
            InitOptions::new(entry.model.clone()).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        TextEmbedding::try_new(options)
            .map_err(|e| DomainError::external(format!("cannot load local model {name}: {e}")))
    }

    #[async_trait]
    impl EmbeddingService for LocalEmbedding {
        async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
            self.embed_batch(&[text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| DomainError::internal("No embedding returned"))
        }

        #[instrument(skip(self, texts), fields(model = %self.model_name, count = texts.len()))]
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = self.model().await?;
            let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
            let vectors = tokio::task::spawn_blocking(move || model.embed(owned, Some(BATCH_SIZE)))
                .await
                .map_err(|e| DomainError::internal(format!("embedding task failed: {e}")))?
                .map_err(|e| DomainError::external(format!("local embedding failed: {e}")))?;

            if vectors.len() != texts.len() {
                return Err(DomainError::external(format!(
                    "embedding backend returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            Ok(vectors.into_iter().map(Embedding::new).collect())
        }
    }

}
