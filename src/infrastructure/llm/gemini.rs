use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::domain::{
    ports::{FragmentStream, GenerationRequest, TextGenerator},
    DomainError,
};
use crate::infrastructure::config::{LlmConfig, Secret, DEFAULT_API_VERSION, GEMINI_BASE_URL};
use crate::infrastructure::gemini::{
    ensure_success, model_path, parse_event, Content, GenerateContentRequest, GenerationConfig,
    SseDecoder, API_KEY_HEADER,
};

/// Fragments buffered between the upstream reader and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Streams `streamGenerateContent` over server-sent events.
pub struct GeminiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    api_key: Secret,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(api_key: Secret) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.api_key.clone())
            .with_base_url(&config.base_url)
            .with_api_version(&config.api_version)
            .with_timeout(Duration::from_secs(config.timeout_seconds))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/{}/{}:streamGenerateContent?alt=sse",
            self.base_url,
            self.api_version,
            model_path(model)
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<FragmentStream, DomainError> {
        let body = GenerateContentRequest {
            contents: vec![Content::user(&request.prompt)],
            system_instruction: Content::text(&request.system_instruction),
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let send = self
            .http
            .post(self.stream_url(model))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                DomainError::external(format!(
                    "model {model} did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DomainError::external(format!("model {model} request failed: {e}")))?;

        let response = ensure_success(model, response).await?;
        debug!(model, "generation stream opened");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump_events(model.to_string(), response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Forwards fragments until the body ends, an error occurs, or the receiver
/// is dropped. Returning drops `response`, which closes the upstream request.
async fn pump_events(
    model: String,
    response: reqwest::Response,
    tx: mpsc::Sender<Result<String, DomainError>>,
) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = body.next().await {
        let events = match chunk {
            Ok(bytes) => decoder.push(&bytes),
            Err(e) => {
                warn!(model, error = %e, "generation stream broke");
                let _ = tx
                    .send(Err(DomainError::external(format!(
                        "model {model} stream failed: {e}"
                    ))))
                    .await;
                return;
            }
        };
        if !forward(&model, events, &tx).await {
            return;
        }
    }

    if forward(&model, decoder.finish(), &tx).await {
        debug!(model, "generation stream complete");
    }
}

/// Returns `false` once the stream should stop.
async fn forward(
    model: &str,
    events: Vec<String>,
    tx: &mpsc::Sender<Result<String, DomainError>>,
) -> bool {
    for payload in events {
        match parse_event(model, &payload) {
            Ok(fragments) => {
                for fragment in fragments {
                    if tx.send(Ok(fragment)).await.is_err() {
                        debug!(model, "consumer went away, abandoning upstream stream");
                        return false;
                    }
                }
            }
            Err(e) => {
                warn!(model, error = %e, "generation stream reported an error");
                let _ = tx.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}
