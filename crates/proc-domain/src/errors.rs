//! Errores del dominio de registros (simples por ahora).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainError {
    #[error("missing field: {0}")] MissingField(String),
    #[error("record source error: {0}")] Source(String),
    #[error("invalid filter: {0}")] InvalidFilter(String),
}
