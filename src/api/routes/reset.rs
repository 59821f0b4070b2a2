use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::api::{error::ApiError, state::AppState};

#[derive(Serialize)]
pub struct ResetResponse {
    pub ok: bool,
}

/// Drops every stored chunk and leaves an empty schema. Nothing is re-ingested
/// until the next start.
pub async fn reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    state.store.wipe().await?;
    state.store.initialize().await?;
    info!("vector store reset");
    Ok(Json(ResetResponse { ok: true }))
}
