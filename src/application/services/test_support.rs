use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};

/// Bag-of-keywords embedding: one dimension per vocabulary word.
pub struct KeywordEmbedding {
    vocabulary: Vec<String>,
    embedded: AtomicUsize,
}

impl KeywordEmbedding {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
            embedded: AtomicUsize::new(0),
        }
    }

    /// Texts embedded so far, the dimension sentinel included.
    pub fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
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
        self.embedded.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}
