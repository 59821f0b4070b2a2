use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::domain::{
    ports::{FragmentStream, GenerationRequest, GenerationService, TextGenerator},
    DomainError,
};

/// Tries each candidate model in priority order.
///
/// A model that rejects the request (client-level error) is skipped; the
/// first one that opens a stream wins and is the only source of output. Any
/// other failure ends the attempt immediately.
pub struct FallbackGenerator {
    backend: Arc<dyn TextGenerator>,
    candidates: Vec<String>,
}

impl FallbackGenerator {
    pub fn new<I, S>(backend: Arc<dyn TextGenerator>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in candidates.into_iter().map(Into::into) {
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self {
            backend,
            candidates: unique,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

#[async_trait]
impl GenerationService for FallbackGenerator {
    #[instrument(skip_all, fields(candidates = self.candidates.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, DomainError> {
        let mut last_error = None;

        for (idx, model) in self.candidates.iter().enumerate() {
            match self.backend.stream(model, request).await {
                Ok(stream) => {
                    if idx > 0 {
                        info!(model = %model, attempt = idx + 1, "fell back to model");
                    }
                    return Ok(stream);
                }
                Err(e) if e.is_client_error() => {
                    warn!(model = %model, error = %e, "model rejected request, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DomainError::internal("no generation model worked")))
    }
}
