use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, state::AppState};
use crate::domain::SearchHit;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResultResponse {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

impl From<SearchHit> for SearchResultResponse {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            document_id: hit.document_id,
            text: hit.text,
            score: hit.score,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResultResponse>>, ApiError> {
    let top_k = request.top_k.unwrap_or_else(|| state.rag.default_top_k());
    let hits = state.rag.retrieve_top_k(&request.query, top_k).await?;
    Ok(Json(hits.into_iter().map(Into::into).collect()))
}
