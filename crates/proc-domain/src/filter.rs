//! Modelo mínimo de filtros para consultar un `RecordSource`.
//!
//! No pretende ser un query-builder completo: cubre los predicados que el
//! motor necesita (igualdad, desigualdad, pertenencia) y la evaluación en
//! memoria usada por la implementación de pruebas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
}

/// Predicado sobre un campo. Para `In`, `values` lista las alternativas; para
/// los operadores binarios se usa el primer elemento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Criterion {
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.value(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            Operator::Equals => self.values.first().map(|v| v == actual).unwrap_or(false),
            Operator::NotEquals => self.values.first().map(|v| v != actual).unwrap_or(true),
            Operator::In => self.values.iter().any(|v| v == actual),
        }
    }
}

/// Conjunción de criterios (AND). Un filtro vacío acepta todo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub criteria: Vec<Criterion>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: Value) -> Self {
        self.criteria.push(Criterion { field: field.into(),
                                       operator: Operator::Equals,
                                       values: vec![value] });
        self
    }

    pub fn not_equals(mut self, field: impl Into<String>, value: Value) -> Self {
        self.criteria.push(Criterion { field: field.into(),
                                       operator: Operator::NotEquals,
                                       values: vec![value] });
        self
    }

    pub fn any_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.criteria.push(Criterion { field: field.into(),
                                       operator: Operator::In,
                                       values });
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.criteria.iter().all(|c| c.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_accepts_everything() {
        let r = Record::new().with_value("a", json!(1));
        assert!(QueryFilter::new().matches(&r));
    }

    #[test]
    fn conjunction_of_criteria() {
        let r = Record::new().with_value("shape", json!("letters"))
                             .with_value("n", json!(3));
        let f = QueryFilter::new().equals("shape", json!("letters"))
                                  .any_of("n", vec![json!(1), json!(3)]);
        assert!(f.matches(&r));

        let f2 = QueryFilter::new().equals("shape", json!("numbers"));
        assert!(!f2.matches(&r));
    }
}
