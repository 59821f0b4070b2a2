use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{
    ensure_dimension,
    ports::{VectorStore, EMBED_DIM_KEY},
    ChunkRecord, DomainError, StoreSnapshot,
};

#[derive(Default)]
struct Tables {
    rows: Vec<ChunkRecord>,
    meta: HashMap<String, String>,
}

/// Process-local store with the same contract as the SQLite one.
pub struct InMemoryVectorStore {
    tables: RwLock<Tables>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn upsert(&self, rows: &[ChunkRecord]) -> Result<(), DomainError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let stored = tables
            .meta
            .get(EMBED_DIM_KEY)
            .and_then(|v| v.parse::<usize>().ok())
            .or_else(|| tables.rows.first().map(|r| r.embedding.dimension()));
        ensure_dimension(rows, stored)?;

        for row in rows {
            tables.rows.retain(|r| r.id != row.id);
            tables.rows.push(row.clone());
        }
        Ok(())
    }

    async fn scan_all(&self) -> Result<StoreSnapshot, DomainError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        if tables.rows.is_empty() {
            return Ok(StoreSnapshot::empty());
        }
        StoreSnapshot::from_records(tables.rows.clone())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(tables.rows.len())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, DomainError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(tables.meta.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        tables.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn wipe(&self) -> Result<(), DomainError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        *tables = Tables::default();
        Ok(())
    }
}
