//! Error types for the fallible edges of the knowledge engine.
//!
//! Data-path operations (register, update, query, claim...) never return errors: a stale
//! handle or an empty result is a normal outcome. Errors only come from configuration,
//! definition parsing and index verification.

use crate::knowledge::KnowledgeHandle;
use thiserror::Error;

/// Result type alias for knowledge engine operations.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Definition parse error: {0}")]
    Definition(#[from] toml::de::Error),

    #[error("Payload codec error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index inconsistency for {handle}: {detail}")]
    IndexInconsistency {
        handle: KnowledgeHandle,
        detail: String,
    },
}

impl KnowledgeError {
    pub(crate) fn inconsistency(handle: KnowledgeHandle, detail: impl Into<String>) -> Self {
        Self::IndexInconsistency {
            handle,
            detail: detail.into(),
        }
    }
}
