//! Definiciones de proceso y registros explícitos.
//!
//! La definición es de sólo lectura: pasos ordenados (cada uno etiquetado
//! frontend/backend, con sub-steps opcionales para flujos state-machine),
//! tipo de flujo, bounds opcionales de registros de entrada y cancel-step
//! opcional.
//!
//! Los registries (`ProcessRegistry`, `BackendStepRegistry`) se construyen
//! una vez al cargar las definiciones: mapas concurrentes explícitos en
//! lugar de caches reflectivas globales.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::step::BackendStep;

/// Tipo de flujo de un proceso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    /// Los steps ejecutan en el orden fijo de la lista.
    Linear,
    /// El siguiente step se decide por nombre, a partir del output de cada
    /// step backend; admite branching y loops.
    StateMachine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Punto de detención que representa interacción de usuario; el motor no
    /// lo ejecuta, sólo lo reporta.
    Frontend,
    /// Lógica de servidor sin interacción.
    Backend,
}

/// Descriptor de un step.
///
/// Para flujos state-machine un step puede llevar 1–2 sub-steps: sólo
/// frontend, sólo backend, o frontend→backend en ese orden. Un step sin
/// sub-steps actúa como su propia (única) parte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStep {
    pub name: String,
    pub kind: StepKind,
    pub sub_steps: Vec<ProcessStep>,
    /// Siguiente step por defecto (state-machine) cuando el output del step
    /// backend no fija uno explícito.
    pub default_next_step: Option<String>,
}

impl ProcessStep {
    pub fn frontend(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               kind: StepKind::Frontend,
               sub_steps: Vec::new(),
               default_next_step: None }
    }

    pub fn backend(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               kind: StepKind::Backend,
               sub_steps: Vec::new(),
               default_next_step: None }
    }

    /// Step compuesto de state-machine (1–2 sub-steps).
    pub fn compound(name: impl Into<String>, sub_steps: Vec<ProcessStep>) -> Self {
        debug_assert!((1..=2).contains(&sub_steps.len()),
                      "un step compuesto lleva 1 o 2 sub-steps");
        Self { name: name.into(),
               kind: StepKind::Backend,
               sub_steps,
               default_next_step: None }
    }

    pub fn with_default_next(mut self, next: impl Into<String>) -> Self {
        self.default_next_step = Some(next.into());
        self
    }

    /// Partes ejecutables del step: sus sub-steps, o él mismo si no tiene.
    pub fn parts(&self) -> &[ProcessStep] {
        if self.sub_steps.is_empty() {
            std::slice::from_ref(self)
        } else {
            &self.sub_steps
        }
    }
}

/// Definición inmutable de un proceso con nombre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub name: String,
    pub flow: FlowKind,
    pub steps: Vec<ProcessStep>,
    /// Campos que el callback de entrada puede suministrar directamente.
    pub input_fields: Vec<String>,
    pub min_input_records: Option<usize>,
    pub max_input_records: Option<usize>,
    pub cancel_step: Option<ProcessStep>,
}

impl ProcessDefinition {
    pub fn new(name: impl Into<String>, flow: FlowKind) -> Self {
        Self { name: name.into(),
               flow,
               steps: Vec::new(),
               input_fields: Vec::new(),
               min_input_records: None,
               max_input_records: None,
               cancel_step: None }
    }

    pub fn add_step(mut self, step: ProcessStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_input_fields(mut self, fields: &[&str]) -> Self {
        self.input_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_min_input_records(mut self, min: usize) -> Self {
        self.min_input_records = Some(min);
        self
    }

    pub fn with_max_input_records(mut self, max: usize) -> Self {
        self.max_input_records = Some(max);
        self
    }

    pub fn with_cancel_step(mut self, step: ProcessStep) -> Self {
        self.cancel_step = Some(step);
        self
    }

    /// Step de primer nivel por nombre.
    pub fn step(&self, name: &str) -> Option<&ProcessStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Step de primer nivel que contiene la parte dada (para retomar un
    /// flujo state-machine tras un sub-step frontend).
    pub fn step_containing(&self, part_name: &str) -> Option<&ProcessStep> {
        self.steps
            .iter()
            .find(|s| s.parts().iter().any(|p| p.name == part_name))
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_record_bounds(&self) -> bool {
        self.min_input_records.is_some() || self.max_input_records.is_some()
    }
}

/// Resolución de definiciones por nombre de proceso (colaborador externo en
/// el contrato; aquí un trait con la superficie mínima que consume el
/// driver).
pub trait ProcessResolver: Send + Sync {
    fn definition(&self, name: &str) -> Option<Arc<ProcessDefinition>>;

    fn steps(&self, name: &str) -> Option<Vec<ProcessStep>> {
        self.definition(name).map(|d| d.steps.clone())
    }

    fn flow_kind(&self, name: &str) -> Option<FlowKind> {
        self.definition(name).map(|d| d.flow)
    }

    fn record_bounds(&self, name: &str) -> Option<(Option<usize>, Option<usize>)> {
        self.definition(name)
            .map(|d| (d.min_input_records, d.max_input_records))
    }

    fn cancel_step(&self, name: &str) -> Option<ProcessStep> {
        self.definition(name).and_then(|d| d.cancel_step.clone())
    }
}

/// Registry concurrente de definiciones, construido al cargar metadatos.
pub struct ProcessRegistry {
    inner: DashMap<String, Arc<ProcessDefinition>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn register(&self, definition: ProcessDefinition) {
        self.inner.insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessResolver for ProcessRegistry {
    fn definition(&self, name: &str) -> Option<Arc<ProcessDefinition>> {
        self.inner.get(name).map(|e| Arc::clone(e.value()))
    }
}

/// Registry de lógica backend: nombre de step → implementación.
pub struct BackendStepRegistry {
    inner: DashMap<String, Arc<dyn BackendStep>>,
}

impl BackendStepRegistry {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn register(&self, step: impl BackendStep + 'static) {
        self.inner.insert(step.name().to_string(), Arc::new(step));
    }

    pub fn register_arc(&self, step: Arc<dyn BackendStep>) {
        self.inner.insert(step.name().to_string(), step);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendStep>> {
        self.inner.get(name).map(|e| Arc::clone(e.value()))
    }
}

impl Default for BackendStepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_containing_finds_sub_steps() {
        let def = ProcessDefinition::new("demo", FlowKind::StateMachine)
            .add_step(ProcessStep::compound("edit",
                                            vec![ProcessStep::frontend("edit.screen"),
                                                 ProcessStep::backend("edit.apply")]))
            .add_step(ProcessStep::backend("finish"));

        assert_eq!(def.step_containing("edit.screen").map(|s| s.name.as_str()), Some("edit"));
        assert_eq!(def.step_containing("edit.apply").map(|s| s.name.as_str()), Some("edit"));
        assert_eq!(def.step_containing("finish").map(|s| s.name.as_str()), Some("finish"));
        assert!(def.step_containing("nope").is_none());
    }

    #[test]
    fn resolver_surface_delegates_to_definition() {
        let registry = ProcessRegistry::new();
        registry.register(ProcessDefinition::new("p", FlowKind::Linear)
            .add_step(ProcessStep::backend("a"))
            .with_min_input_records(2)
            .with_cancel_step(ProcessStep::backend("undo")));

        assert_eq!(registry.flow_kind("p"), Some(FlowKind::Linear));
        assert_eq!(registry.record_bounds("p"), Some((Some(2), None)));
        assert_eq!(registry.cancel_step("p").map(|s| s.name), Some("undo".to_string()));
        assert!(registry.definition("missing").is_none());
    }
}
