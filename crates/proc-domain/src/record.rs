//! `Record`: fila genérica con valores ordenados y mensajes por registro.
//!
//! Rol en el flujo:
//! - Los steps backend reciben y producen lotes de `Record`.
//! - Validaciones (customizers, claves únicas, bounds) anotan errores o
//!   warnings sobre el registro afectado sin tocar al resto del lote.
//! - El estado agregado (`Status`) se deriva de los mensajes acumulados.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severidad agregada de un registro o de una línea de resumen.
///
/// Orden semántico: `Error` domina sobre `Warning`, que domina sobre `Info`
/// y `Ok`. No hay transición inversa: un registro con error nunca vuelve a
/// `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Info,
    Warning,
    Error,
}

/// Fila genérica procesada por el motor.
///
/// `values` conserva orden de inserción (IndexMap) porque los procesos de
/// carga masiva reportan columnas en el orden en que llegaron.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub values: IndexMap<String, Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder ergonómico: `Record::new().with_value("sku", json!("A-1"))`.
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Valor como string plano (números y bools se formatean; null/ausente es
    /// `None`).
    pub fn value_string(&self, field: &str) -> Option<String> {
        match self.values.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Clave compuesta a partir de una lista de campos (valores unidos por
    /// `|`). Devuelve `None` si algún campo falta o es null: una clave
    /// incompleta no participa en chequeos de unicidad.
    pub fn composite_key(&self, fields: &[String]) -> Option<String> {
        let mut parts = Vec::with_capacity(fields.len());
        for f in fields {
            parts.push(self.value_string(f)?);
        }
        Some(parts.join("|"))
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.infos.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Severidad agregada del registro según sus mensajes acumulados.
    pub fn status(&self) -> Status {
        if !self.errors.is_empty() {
            Status::Error
        } else if !self.warnings.is_empty() {
            Status::Warning
        } else if !self.infos.is_empty() {
            Status::Info
        } else {
            Status::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_key_requires_all_fields() {
        let r = Record::new().with_value("sku", json!("A-1"))
                             .with_value("storeId", json!(7));
        let fields = vec!["sku".to_string(), "storeId".to_string()];
        assert_eq!(r.composite_key(&fields), Some("A-1|7".to_string()));

        let missing = vec!["sku".to_string(), "warehouseId".to_string()];
        assert_eq!(r.composite_key(&missing), None);
    }

    #[test]
    fn status_escalates_with_messages() {
        let mut r = Record::new();
        assert_eq!(r.status(), Status::Ok);
        r.add_info("loaded");
        assert_eq!(r.status(), Status::Info);
        r.add_warning("suspicious");
        assert_eq!(r.status(), Status::Warning);
        r.add_error("broken");
        assert_eq!(r.status(), Status::Error);
    }
}
