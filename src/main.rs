use std::sync::Arc;

use kb_rag::api::{self, create_router, AppState};
use kb_rag::application::IngestionService;
use kb_rag::domain::ports::GenerationService;
use kb_rag::infrastructure::{embedding, vector_store, AppConfig, FallbackGenerator, GeminiGenerator};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_rag=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = AppConfig::from_env()?;
    let config = &app_config.config;
    info!(
        embed_backend = ?config.embedding.backend,
        embed_model = %config.embedding.model,
        gen_model = %config.llm.model,
        store = ?config.store.backend,
        "configuration loaded"
    );

    let embedder = embedding::from_config(&config.embedding)?;
    let store = vector_store::from_config(&config.store);

    let candidates = std::iter::once(config.llm.model.clone())
        .chain(config.llm.fallback_models.iter().cloned());
    let generator: Arc<dyn GenerationService> = Arc::new(FallbackGenerator::new(
        Arc::new(GeminiGenerator::from_config(&config.llm)),
        candidates,
    ));

    let report = IngestionService::new(
        embedder.clone(),
        store.clone(),
        config.rag.kb_dir.clone(),
        config.rag.chunk_size,
        config.rag.chunk_overlap,
    )
    .bootstrap()
    .await?;
    info!(
        dimension = report.dimension,
        rebuilt = report.rebuilt,
        files = report.files_ingested,
        chunks = report.chunks_ingested,
        "bootstrap complete"
    );

    let listener = api::bind(&config.server).await?;
    let app = create_router(AppState::new(&app_config, embedder, store, generator));

    info!("API server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
