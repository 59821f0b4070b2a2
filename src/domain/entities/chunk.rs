use serde::{Deserialize, Serialize};

use super::embedding::{Embedding, EmbeddingMatrix};

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 120;

/// One stored unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub embedding: Embedding,
}

impl ChunkRecord {
    pub fn new(
        document_id: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        embedding: Embedding,
    ) -> Self {
        let document_id = document_id.into();
        Self {
            id: chunk_id(&document_id, chunk_index),
            document_id,
            text: text.into(),
            embedding,
        }
    }
}

pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}-{chunk_index}")
}

/// Checks that every row has `expected` dimensions, or, when the store has no
/// reference yet, the same dimension as the first row.
pub fn ensure_dimension(
    rows: &[ChunkRecord],
    expected: Option<usize>,
) -> Result<(), crate::domain::DomainError> {
    let Some(expected) = expected.or_else(|| rows.first().map(|r| r.embedding.dimension())) else {
        return Ok(());
    };
    match rows.iter().find(|r| r.embedding.dimension() != expected) {
        Some(row) => Err(crate::domain::DomainError::storage(format!(
            "chunk {} has {} dimensions, store holds {expected}",
            row.id,
            row.embedding.dimension()
        ))),
        None => Ok(()),
    }
}

/// Full read of the store as parallel columns.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub ids: Vec<String>,
    pub document_ids: Vec<String>,
    pub texts: Vec<String>,
    pub matrix: EmbeddingMatrix,
}

impl StoreSnapshot {
    pub fn empty() -> Self {
        Self {
            ids: Vec::new(),
            document_ids: Vec::new(),
            texts: Vec::new(),
            matrix: EmbeddingMatrix::placeholder(),
        }
    }

    pub fn from_records(records: Vec<ChunkRecord>) -> Result<Self, crate::domain::DomainError> {
        let mut ids = Vec::with_capacity(records.len());
        let mut document_ids = Vec::with_capacity(records.len());
        let mut texts = Vec::with_capacity(records.len());
        let mut embeddings = Vec::with_capacity(records.len());

        for record in records {
            ids.push(record.id);
            document_ids.push(record.document_id);
            texts.push(record.text);
            embeddings.push(record.embedding);
        }

        Ok(Self {
            ids,
            document_ids,
            texts,
            matrix: EmbeddingMatrix::from_rows(embeddings)?,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

/// Splits `text` into overlapping windows of `size` whitespace tokens.
///
/// Windows advance by `max(1, size - overlap)` tokens and are re-joined with
/// single spaces. Text that fits in one window (including empty text) comes
/// back unchanged as the only chunk.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= size {
        return vec![text.to_string()];
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::with_capacity(tokens.len().div_ceil(step));
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + size).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        start += step;
    }

    chunks
}
