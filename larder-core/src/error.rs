use thiserror::Error;

use crate::types::SourceKind;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record for {kind} {source_id} is outside the replaced scope")]
    OutOfScope { kind: SourceKind, source_id: String },
}

impl StoreError {
    /// Wrap a backend-specific error (diesel, r2d2, ...).
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}
