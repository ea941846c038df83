use thiserror::Error;

use crate::{document::TrackerDocument, error::DomainError};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("stored document failed validation: {0}")]
    Invalid(#[from] DomainError),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Whole-document storage. Implementations read and overwrite the complete
/// dataset; there is no partial update and no merge.
pub trait DocumentProvider: Send + Sync {
    fn load(&self) -> Result<TrackerDocument, PersistenceError>;
    fn save(&self, document: &TrackerDocument) -> Result<(), PersistenceError>;
}
