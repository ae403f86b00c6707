//! Error types for the CLI.

use trustcache_core::{ConfigError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to init logging: {0}")]
    Logging(String),
}

pub type CliResult<T> = Result<T, CliError>;
