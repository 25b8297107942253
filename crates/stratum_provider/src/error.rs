//! Error types for provider operations.

use thiserror::Error;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors a provisioning provider can report for a create call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{operation} failed for '{name}': {message}")]
    CreateFailed {
        operation: String,
        name: String,
        message: String,
    },

    #[error("Invalid request for '{name}': {message}")]
    InvalidRequest { name: String, message: String },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Shorthand for a failed create call.
    pub fn create_failed(
        operation: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CreateFailed {
            operation: operation.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}
