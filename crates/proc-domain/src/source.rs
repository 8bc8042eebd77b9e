//! Contrato de acceso a datos (`RecordSource`) e implementación en memoria.
//!
//! El motor trata el almacenamiento de registros como opaco: sólo necesita
//! query/insert/update para materializar lotes y para que los procesos de
//! carga masiva escriban resultados. La implementación en memoria existe
//! para pruebas y demos; una integración real vive fuera de este workspace.

use std::sync::Mutex;

use serde_json::Value;

use crate::errors::DomainError;
use crate::filter::QueryFilter;
use crate::record::Record;

/// Primitivas de consulta/escritura sobre un backend de registros.
pub trait RecordSource: Send + Sync {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<Record>, DomainError>;

    /// Inserta los registros dados y devuelve la versión almacenada.
    fn insert(&self, records: Vec<Record>) -> Result<Vec<Record>, DomainError>;

    /// Actualiza registros existentes (correlación por clave a cargo de la
    /// implementación).
    fn update(&self, records: Vec<Record>) -> Result<Vec<Record>, DomainError>;

    fn count(&self, filter: &QueryFilter) -> Result<usize, DomainError> {
        Ok(self.query(filter)?.len())
    }
}

/// Backend en memoria: un Vec protegido por Mutex.
///
/// `key_field` correlaciona updates (y sirve como identificador natural en
/// demos); por defecto `"uuid"`.
pub struct InMemoryRecordSource {
    rows: Mutex<Vec<Record>>,
    key_field: String,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()),
               key_field: "uuid".to_string() }
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Siembra filas iniciales (tests/demos).
    pub fn seed(&self, records: Vec<Record>) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.extend(records);
    }

    pub fn all(&self) -> Vec<Record> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.clone()
    }
}

impl Default for InMemoryRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSource for InMemoryRecordSource {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<Record>, DomainError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn insert(&self, records: Vec<Record>) -> Result<Vec<Record>, DomainError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.extend(records.iter().cloned());
        Ok(records)
    }

    fn update(&self, records: Vec<Record>) -> Result<Vec<Record>, DomainError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        for incoming in &records {
            let key = incoming.value(&self.key_field)
                              .cloned()
                              .unwrap_or(Value::Null);
            if key == Value::Null {
                return Err(DomainError::MissingField(self.key_field.clone()));
            }
            for row in rows.iter_mut() {
                if row.value(&self.key_field) == Some(&key) {
                    row.values = incoming.values.clone();
                }
            }
        }
        Ok(records)
    }
}
