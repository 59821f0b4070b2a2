mod in_memory;
mod sqlite;

use std::sync::Arc;

use crate::domain::ports::VectorStore;
use crate::infrastructure::config::{StoreBackend, StoreConfig};

pub use in_memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Builds the vector store selected in configuration.
pub fn from_config(config: &StoreConfig) -> Arc<dyn VectorStore> {
    match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteVectorStore::new(config.db_path.clone())),
        StoreBackend::Memory => Arc::new(InMemoryVectorStore::new()),
    }
}
