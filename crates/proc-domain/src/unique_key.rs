//! Chequeo de claves únicas (simples o compuestas) para lotes de inserción.
//!
//! Reglas:
//! - Se valida contra las filas ya existentes en el `RecordSource` Y contra
//!   los registros anteriores del mismo lote (la primera aparición gana).
//! - Un registro sin valor en alguno de los campos de la clave no participa
//!   del chequeo (claves incompletas no colisionan).
//! - La violación anota un error en el registro afectado; el lote continúa.

use std::collections::HashSet;

use crate::customizer::RecordCustomizer;
use crate::errors::DomainError;
use crate::filter::QueryFilter;
use crate::record::Record;
use crate::source::RecordSource;

pub struct UniqueKeyCheck {
    fields: Vec<String>,
}

impl UniqueKeyCheck {
    pub fn new(fields: &[&str]) -> Self {
        Self { fields: fields.iter().map(|f| f.to_string()).collect() }
    }

    /// Mensaje estable por regla: agrupa en el resumen todas las violaciones
    /// de la misma clave.
    pub fn message(&self) -> String {
        format!("duplicate value for unique key ({})", self.fields.join(", "))
    }

    /// Marca con error los registros cuya clave ya existe en el source o
    /// duplica a un registro anterior del lote. Devuelve cuántos quedaron
    /// marcados.
    pub fn apply(&self, records: &mut [Record], source: &dyn RecordSource) -> Result<usize, DomainError> {
        let existing_rows = source.query(&QueryFilter::new())?;
        let mut taken: HashSet<String> = existing_rows.iter()
                                                      .filter_map(|r| r.composite_key(&self.fields))
                                                      .collect();

        let mut flagged = 0;
        for record in records.iter_mut() {
            let Some(key) = record.composite_key(&self.fields) else {
                continue;
            };
            if taken.contains(&key) {
                record.add_error(self.message());
                flagged += 1;
            } else {
                taken.insert(key);
            }
        }
        Ok(flagged)
    }
}

impl RecordCustomizer for UniqueKeyCheck {
    fn pre_insert(&self, records: &mut [Record], source: &dyn RecordSource) -> Result<(), DomainError> {
        self.apply(records, source).map(|_| ())
    }
}
