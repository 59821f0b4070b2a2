use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::{error::ApiError, state::AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chunks: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let chunks = state.store.count().await?;
    Ok(Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        chunks,
    }))
}
