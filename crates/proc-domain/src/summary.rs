//! Resumen estructurado de un proceso por lotes.
//!
//! Cada línea agrupa un mensaje idéntico con su severidad, la cantidad de
//! registros afectados y sus claves. El modelo de fallo parcial exige que
//! una fila inválida no aborte el lote: el resumen es la vista agregada de
//! qué pasó con cada grupo.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::{Record, Status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummaryLine {
    pub status: Status,
    pub message: String,
    pub count: usize,
    pub record_keys: Vec<String>,
}

/// Acumulador que agrupa por (status, mensaje) preservando orden de llegada.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    groups: IndexMap<(Status, String), Vec<String>>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, status: Status, message: impl Into<String>, record_key: impl Into<String>) {
        self.groups
            .entry((status, message.into()))
            .or_default()
            .push(record_key.into());
    }

    /// Vuelca un registro completo: errores, warnings, infos, o la línea OK
    /// si no tiene mensajes. `key_field` identifica al registro en el
    /// resumen (si falta, se usa el índice dado).
    pub fn add_record(&mut self, record: &Record, key_field: &str, index: usize, ok_message: &str) {
        let key = record.value_string(key_field)
                        .unwrap_or_else(|| format!("row {index}"));
        for m in &record.errors {
            self.add(Status::Error, m.clone(), key.clone());
        }
        for m in &record.warnings {
            self.add(Status::Warning, m.clone(), key.clone());
        }
        for m in &record.infos {
            self.add(Status::Info, m.clone(), key.clone());
        }
        if record.status() == Status::Ok {
            self.add(Status::Ok, ok_message, key);
        }
    }

    pub fn into_lines(self) -> Vec<ProcessSummaryLine> {
        self.groups
            .into_iter()
            .map(|((status, message), keys)| ProcessSummaryLine { status,
                                                                  message,
                                                                  count: keys.len(),
                                                                  record_keys: keys })
            .collect()
    }
}

/// Conveniencia: resume un lote completo en líneas agrupadas.
pub fn summarize_batch(records: &[Record], key_field: &str, ok_message: &str) -> Vec<ProcessSummaryLine> {
    let mut acc = SummaryAccumulator::new();
    for (i, r) in records.iter().enumerate() {
        acc.add_record(r, key_field, i, ok_message);
    }
    acc.into_lines()
}
