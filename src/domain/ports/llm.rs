use std::pin::Pin;

use crate::domain::errors::DomainError;
use async_trait::async_trait;
use futures::Stream;

/// Ordered, finite text fragments. An `Err` item terminates the stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: String,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        system_instruction: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: system_instruction.into(),
            temperature,
        }
    }
}

/// A single streaming attempt against one named model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, DomainError>;
}

/// Streaming generation with the model choice left to the implementation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, DomainError>;
}
