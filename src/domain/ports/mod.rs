mod embedding;
mod llm;
mod vector_store;

pub use embedding::{EmbeddingService, DIMENSION_PROBE};
pub use llm::{FragmentStream, GenerationRequest, GenerationService, TextGenerator};
pub use vector_store::{VectorStore, EMBED_DIM_KEY};
