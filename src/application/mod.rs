//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations: startup ingestion, retrieval, and grounded chat.

pub mod services;

pub use services::{BootstrapReport, ChatService, IngestionService, RagService};
