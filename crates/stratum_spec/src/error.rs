//! Error types for the spec module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while loading or validating a stack file.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Stack file not found: {0}")]
    NotFound(PathBuf),

    #[error("User data file not found: {0}")]
    UserDataNotFound(PathBuf),

    #[error("Invalid stack format in file {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Invalid CIDR block '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("Stack validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
