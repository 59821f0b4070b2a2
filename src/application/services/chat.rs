use std::sync::Arc;
use tracing::{info, instrument};

use crate::application::services::RagService;
use crate::domain::{
    ports::{FragmentStream, GenerationRequest, GenerationService},
    DomainError, SearchHit,
};
use crate::infrastructure::config::PromptsConfig;

/// Answers a question from retrieved context, streaming the model output.
pub struct ChatService {
    rag: Arc<RagService>,
    generator: Arc<dyn GenerationService>,
    prompts: PromptsConfig,
}

impl ChatService {
    pub fn new(
        rag: Arc<RagService>,
        generator: Arc<dyn GenerationService>,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            rag,
            generator,
            prompts,
        }
    }

    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn stream_answer(
        &self,
        query: &str,
        top_k: usize,
        temperature: f32,
    ) -> Result<FragmentStream, DomainError> {
        let hits = self.rag.retrieve_top_k(query, top_k).await?;
        info!(retrieved = hits.len(), "context assembled");

        let request = GenerationRequest::new(query, self.system_instruction(&hits), temperature);
        self.generator.generate(&request).await
    }

    /// Numbered fragments `[1] ...` separated by blank lines, or the
    /// no-results marker.
    pub fn context_block(&self, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return self.prompts.no_results.clone();
        }
        hits.iter()
            .enumerate()
            .map(|(i, hit)| format!("[{}] {}", i + 1, hit.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn system_instruction(&self, hits: &[SearchHit]) -> String {
        format!(
            "{}\n\n{}\n{}",
            self.prompts.rules.trim_end(),
            self.prompts.context_header,
            self.context_block(hits)
        )
    }
}
