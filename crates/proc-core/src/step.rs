//! Contrato de steps backend: vistas de entrada/salida y plan de mutación.
//!
//! El motor es dueño único del `ProcessState`. Un step recibe una vista de
//! sólo lectura (`StepInput`) y produce una vista de sólo escritura
//! (`StepOutput`); el merge al estado lo hace el executor en un paso
//! explícito. No hay aliasing de estado mutable entre entrada y salida.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use proc_domain::{QueryFilter, Record};

use crate::errors::EngineError;

/// Vista de sólo lectura sobre el estado, entregada al cuerpo del step.
pub struct StepInput<'a> {
    pub process_name: &'a str,
    pub step_name: &'a str,
    pub values: &'a HashMap<String, Value>,
    pub records: &'a [Record],
    /// El caller navega hacia atrás; descartar efectos solo-hacia-adelante.
    pub is_step_back: bool,
    /// Canal de progreso incremental (actual/total) para jobs largos.
    pub progress: &'a dyn ProgressSink,
}

impl<'a> StepInput<'a> {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn value_string(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Mutación del plan de ejecución pedida por un step: reemplazo de la lista
/// restante de steps y/o salto directo a un step de la lista instalada. El
/// driver la aplica atómicamente en la misma invocación.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    pub new_step_list: Option<Vec<String>>,
    pub override_last_step: Option<String>,
}

/// Vista de sólo escritura producida por el cuerpo del step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Valores nuevos/cambiados; se mergean sobre `ProcessState::values`.
    pub values: HashMap<String, Value>,
    /// Reemplazo del lote de registros (None = sin cambios).
    pub records: Option<Vec<Record>>,
    /// Próximo step por nombre (sólo flujos state-machine).
    pub next_step_name: Option<String>,
    /// Mutación del plan de ejecución (ver `StepPlan`).
    pub plan: Option<StepPlan>,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = Some(records);
        self
    }

    /// Fija el próximo step por nombre (state-machine).
    pub fn go_to(mut self, step: impl Into<String>) -> Self {
        self.next_step_name = Some(step.into());
        self
    }

    /// Reemplaza la lista restante de steps.
    pub fn with_new_step_list(mut self, steps: Vec<String>) -> Self {
        self.plan.get_or_insert_with(StepPlan::default).new_step_list = Some(steps);
        self
    }

    /// Salta directamente al step indicado de la lista instalada.
    pub fn with_override_last_step(mut self, step: impl Into<String>) -> Self {
        self.plan.get_or_insert_with(StepPlan::default).override_last_step = Some(step.into());
        self
    }
}

/// Lógica de un step backend. Implementaciones viven fuera del motor y se
/// registran por nombre en el `BackendStepRegistry`.
pub trait BackendStep: Send + Sync {
    /// Nombre estable con el que el step aparece en las definiciones.
    fn name(&self) -> &str;

    fn run(&self, input: &StepInput<'_>) -> Result<StepOutput, EngineError>;
}

/// Callback de captura de entrada: cuando un step backend necesita registros
/// y el caller no suministró un lote explícito, el callback aporta un filtro
/// de consulta o valores directos de campos.
pub trait ProcessCallback: Send + Sync {
    fn query_filter(&self) -> Option<QueryFilter> {
        None
    }

    fn field_values(&self, _fields: &[String]) -> HashMap<String, Value> {
        HashMap::new()
    }
}

/// Sink de progreso incremental para jobs largos.
pub trait ProgressSink: Send + Sync {
    fn update(&self, current: u64, total: Option<u64>);
}

/// Implementación nula: ejecución síncrona sin canal de polling.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn update(&self, _current: u64, _total: Option<u64>) {}
}
