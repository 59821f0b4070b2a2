use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    /// Upstream refused the request for this model (4xx): unknown model,
    /// quota exhausted, bad request. Callers may try another model.
    #[error("Model {model} rejected request ({status}): {message}")]
    ModelRejected {
        model: String,
        status: u16,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn rejected(model: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::ModelRejected {
            model: model.into(),
            status,
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ModelRejected { .. })
    }
}
