mod chunk;
mod embedding;

pub use chunk::{
    chunk_id, chunk_text, ensure_dimension, ChunkRecord, SearchHit, StoreSnapshot, CHUNK_OVERLAP,
    CHUNK_SIZE,
};
pub use embedding::{top_k, top_k_scored, Embedding, EmbeddingMatrix, NORM_EPSILON};
