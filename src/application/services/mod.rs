mod chat;
mod ingestion;
mod rag;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::ChatService;
pub use ingestion::{BootstrapReport, IngestionService};
pub use rag::RagService;
