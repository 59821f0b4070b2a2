#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use kb_rag::api::AppState;
use kb_rag::domain::ports::{
    EmbeddingService, FragmentStream, GenerationRequest, TextGenerator, VectorStore,
};
use kb_rag::domain::{DomainError, Embedding};
use kb_rag::infrastructure::{AppConfig, FallbackGenerator};

/// One dimension per vocabulary word, counting occurrences.
pub struct KeywordEmbedding {
    vocabulary: Vec<String>,
}

impl KeywordEmbedding {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .collect();
        Embedding::new(
            self.vocabulary
                .iter()
                .map(|v| words.iter().filter(|w| *w == v).count() as f32)
                .collect(),
        )
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Streams a fixed script per model. Models in `rejected` answer 404.
pub struct ScriptedGenerator {
    pub rejected: Vec<String>,
    pub script: Vec<Result<String, String>>,
    pub seen: Mutex<Vec<(String, GenerationRequest)>>,
}

impl ScriptedGenerator {
    pub fn new(rejected: &[&str], script: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            rejected: rejected.iter().map(|m| m.to_string()).collect(),
            script: script.iter().map(|f| Ok(f.to_string())).collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_after(fragments: &[&str], error: &str) -> Arc<Self> {
        let mut script: Vec<Result<String, String>> =
            fragments.iter().map(|f| Ok(f.to_string())).collect();
        script.push(Err(error.to_string()));
        Arc::new(Self {
            rejected: Vec::new(),
            script,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn models_tried(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, DomainError> {
        self.seen
            .lock()
            .unwrap()
            .push((model.to_string(), request.clone()));
        if self.rejected.iter().any(|m| m == model) {
            return Err(DomainError::rejected(model, 404, "model not found"));
        }
        let items: Vec<Result<String, DomainError>> = self
            .script
            .iter()
            .map(|step| match step {
                Ok(f) => Ok(format!("{model}:{f}")),
                Err(e) => Err(DomainError::external(e.clone())),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "GOOGLE_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn state_with(
    store: Arc<dyn VectorStore>,
    backend: Arc<ScriptedGenerator>,
    models: &[&str],
) -> AppState {
    let embedding = Arc::new(KeywordEmbedding::new(&["rust", "python", "go"]));
    let generator = Arc::new(FallbackGenerator::new(backend, models.iter().copied()));
    AppState::new(&test_config(), embedding, store, generator)
}
