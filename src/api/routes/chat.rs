use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::api::{error::ApiError, state::AppState};

fn default_top_k() -> usize {
    5
}

fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Streams the answer as plain-text fragments in model order.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let fragments = state
        .chat
        .stream_answer(&request.query, request.top_k, request.temperature)
        .await?;

    let body = Body::from_stream(fragments.inspect_err(|e| {
        tracing::error!(error = %e, "generation stream failed mid-answer");
    }));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}
