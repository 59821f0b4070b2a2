use crate::domain::{errors::DomainError, ChunkRecord, StoreSnapshot};
use async_trait::async_trait;

/// Metadata key holding the dimension the store was built with.
pub const EMBED_DIM_KEY: &str = "embed_dim";

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the schema if missing. Idempotent.
    async fn initialize(&self) -> Result<(), DomainError>;
    /// Insert-or-replace by id, all rows in one transaction.
    async fn upsert(&self, rows: &[ChunkRecord]) -> Result<(), DomainError>;
    async fn scan_all(&self) -> Result<StoreSnapshot, DomainError>;
    async fn count(&self) -> Result<usize, DomainError>;
    async fn get_meta(&self, key: &str) -> Result<Option<String>, DomainError>;
    async fn set_meta(&self, key: &str, value: &str) -> Result<(), DomainError>;
    /// Destroys every row and metadata entry and leaves an empty schema.
    async fn wipe(&self) -> Result<(), DomainError>;
}
