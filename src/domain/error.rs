use thiserror::Error;

use super::filename::{ContentError, FilenameError};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Filename(#[from] FilenameError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("file `{filename}` exceeds the {max_bytes} byte limit")]
    TooLarge { filename: String, max_bytes: u64 },
}

impl DomainError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
