//! Errores de persistencia.
//! Mapea errores de IO / serialización a variantes semánticas y de ahí al
//! contrato `StoreError` que consume el motor.

use std::path::PathBuf;

use proc_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Io(e) => StoreError::Io(e.to_string()),
            PersistenceError::Serde(e) => StoreError::Serde(e.to_string()),
            PersistenceError::Corrupt { path, reason } => {
                StoreError::Serde(format!("corrupt state file {}: {reason}", path.display()))
            }
        }
    }
}
