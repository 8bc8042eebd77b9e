//! Errores del motor de procesos.
//!
//! La taxonomía distingue cuatro familias que el caller trata distinto:
//! - Errores de definición (proceso/step inexistente): fatales, nunca se
//!   reintentan.
//! - Errores de validación orientados al usuario (bounds de registros): se
//!   presentan tal cual en una UI (`is_user_facing`).
//! - Protección de loops (límite de steps backend encadenados): convierte
//!   una recursión sin fin en un fallo acotado y diagnósticable.
//! - Errores de cuerpo de step: cualquier falla del step se envuelve con el
//!   contexto proceso/step y termina la invocación.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use proc_domain::DomainError;

/// Errores del contrato de persistencia de estado (`StateStore`).
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreError {
    #[error("state version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("state serialization error: {0}")] Serde(String),
    #[error("state storage io error: {0}")] Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("process not found: {name}")] ProcessNotFound { name: String },
    #[error("step {step} not found in process {process}")]
    StepNotFound { process: String, step: String },
    #[error("no persisted state found for process {process} under id {id}")]
    StateNotFound { process: String, id: Uuid },
    #[error("cancel request for process {process} is missing a process id")]
    MissingProcessId { process: String },
    #[error("too few records: got {got}, minimum is {min}")]
    TooFewRecords { min: usize, got: usize },
    #[error("too many records: got {got}, maximum is {max}")]
    TooManyRecords { max: usize, got: usize },
    #[error("backend step loop limit of {limit} reached in process {process}")]
    StepLoopLimit { process: String, limit: u32 },
    #[error("process {process} reached frontend step {step}, which the caller does not allow")]
    FrontendStepNotAllowed { process: String, step: String },
    #[error("step {step} of process {process} failed: {message}")]
    StepExecution { process: String, step: String, message: String },
    #[error("concurrent state update detected for process {process}")]
    ConcurrentStateUpdate { process: String },
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Domain(#[from] DomainError),
    #[error("internal: {0}")] Internal(String),
}

impl EngineError {
    /// Errores pensados para mostrarse a un usuario final (validación de
    /// bounds). El resto son fallas de definición o de infraestructura.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::TooFewRecords { .. } | Self::TooManyRecords { .. })
    }
}
