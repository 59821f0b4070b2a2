use std::sync::Arc;

use crate::application::{ChatService, RagService};
use crate::domain::ports::{EmbeddingService, GenerationService, VectorStore};
use crate::infrastructure::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VectorStore>,
    pub rag: Arc<RagService>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Wires the request-time services around already-built providers.
    pub fn new(
        config: &AppConfig,
        embedding: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        let rag = Arc::new(RagService::new(
            embedding,
            store.clone(),
            config.config.rag.top_k,
        ));
        let chat = Arc::new(ChatService::new(
            rag.clone(),
            generator,
            config.prompts.clone(),
        ));
        Self { store, rag, chat }
    }
}
