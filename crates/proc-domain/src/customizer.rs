//! Hooks de customización por registro (pre-insert / pre-update).
//!
//! Un customizer inspecciona el lote antes de escribirlo y anota warnings o
//! errores sobre registros individuales. Nunca aborta el lote: un registro
//! marcado con error simplemente se excluye de la escritura y aparece en el
//! resumen del proceso.

use crate::errors::DomainError;
use crate::record::Record;
use crate::source::RecordSource;

pub trait RecordCustomizer: Send + Sync {
    /// Validación previa a insertar. Anotar mensajes en los registros; sólo
    /// devolver `Err` ante fallas de infraestructura (p.ej. el source no
    /// responde), no por datos inválidos.
    fn pre_insert(&self, _records: &mut [Record], _source: &dyn RecordSource) -> Result<(), DomainError> {
        Ok(())
    }

    /// Validación previa a actualizar. Mismas reglas que `pre_insert`.
    fn pre_update(&self, _records: &mut [Record], _source: &dyn RecordSource) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Aplica una cadena de customizers en orden y devuelve cuántos registros
/// quedaron sin errores (los únicos elegibles para escritura).
pub fn apply_pre_insert(customizers: &[Box<dyn RecordCustomizer>],
                        records: &mut [Record],
                        source: &dyn RecordSource)
                        -> Result<usize, DomainError> {
    for c in customizers {
        c.pre_insert(records, source)?;
    }
    Ok(records.iter().filter(|r| !r.has_errors()).count())
}
