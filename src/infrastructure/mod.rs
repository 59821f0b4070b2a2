pub mod config;
pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod vector_store;

pub use config::{AppConfig, Config, PromptsConfig};
pub use embedding::{GeminiEmbedding, OpenAiEmbedding};
pub use llm::{FallbackGenerator, GeminiGenerator};
pub use vector_store::{InMemoryVectorStore, SqliteVectorStore};
