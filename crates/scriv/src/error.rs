//! CLI error types.

use scriv_cache::CacheError;
use scriv_config::ConfigError;
use scriv_storage::{ParseIdError, StoreError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    InvalidId(#[from] ParseIdError),

    #[error("{0}")]
    Validation(String),
}
