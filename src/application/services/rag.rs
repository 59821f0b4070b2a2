use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    top_k_scored, DomainError, SearchHit,
};

/// Exact top-k retrieval over a fresh snapshot of the store.
pub struct RagService {
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl RagService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>, DomainError> {
        self.retrieve_top_k(query, self.default_top_k).await
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("query must not be empty"));
        }

        let snapshot = self.vector_store.scan_all().await?;
        let query_vec = self.embedding.embed(query).await?;

        if !snapshot.matrix.is_empty() && query_vec.dimension() != snapshot.matrix.cols() {
            return Err(DomainError::validation(format!(
                "query embedding has {} dimensions but the store holds {}; rebuild the store",
                query_vec.dimension(),
                snapshot.matrix.cols()
            )));
        }

        let hits: Vec<SearchHit> = top_k_scored(query_vec.as_slice(), &snapshot.matrix, top_k)
            .into_iter()
            .map(|(i, score)| SearchHit {
                id: snapshot.ids[i].clone(),
                document_id: snapshot.document_ids[i].clone(),
                text: snapshot.texts[i].clone(),
                score,
            })
            .collect();

        debug!(candidates = snapshot.len(), returned = hits.len(), "retrieval done");
        Ok(hits)
    }
}
