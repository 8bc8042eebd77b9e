//! `ProcessState`: el registro serializable que da continuidad a un proceso
//! a través de invocaciones sin afinidad de sesión.
//!
//! Rol en el flujo:
//! - El driver lo carga (o crea) al inicio de cada invocación, lo posee en
//!   exclusiva mientras camina los steps y lo persiste al final.
//! - Invariante: tras cada invocación vale exactamente una de dos cosas:
//!   `next_step_name` ausente (proceso terminado) o presente (detenido antes
//!   de ese step frontend).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use proc_domain::Record;

/// Discriminador del tipo de estado persistido bajo un mismo identificador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Estado de un proceso en curso.
    Process,
    /// Snapshot de progreso de un job asíncrono.
    AsyncJob,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Process => "process",
            StateKind::AsyncJob => "async-job",
        }
    }
}

/// Clave de persistencia: identificador de instancia + tipo de estado.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub id: Uuid,
    pub kind: StateKind,
}

impl StateKey {
    pub fn process(id: Uuid) -> Self {
        Self { id, kind: StateKind::Process }
    }

    pub fn async_job(id: Uuid) -> Self {
        Self { id, kind: StateKind::AsyncJob }
    }
}

/// Estado mutable y serializable de una instancia de proceso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessState {
    /// Variables de scratch visibles para todos los steps.
    pub values: HashMap<String, Value>,
    /// Lote de registros en procesamiento (puede estar vacío).
    pub records: Vec<Record>,
    /// Secuencia de steps actualmente agendada; mutable durante la ejecución.
    pub step_list: Vec<String>,
    /// Cursor: ausente = proceso completo; presente = detenido antes de este
    /// step frontend.
    pub next_step_name: Option<String>,
    /// El caller navega hacia atrás por steps frontend ya visitados; los
    /// steps deben descartar efectos solo-hacia-adelante.
    pub is_step_back: bool,
    /// Salto directo a este step en lugar del siguiente secuencial.
    pub override_last_step_name: Option<String>,
    /// Última escritura (lo usa la política de retención del store).
    pub updated_at: DateTime<Utc>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self { values: HashMap::new(),
               records: Vec::new(),
               step_list: Vec::new(),
               next_step_name: None,
               is_step_back: false,
               override_last_step_name: None,
               updated_at: Utc::now() }
    }

    /// Marca el estado como recién escrito.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}
