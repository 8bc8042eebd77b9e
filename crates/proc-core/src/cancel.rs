//! Cancelación de un proceso detenido.
//!
//! La cancelación es una operación de primera clase: si la definición trae
//! cancel-step, su cuerpo corre con el estado persistido (sin validar bounds
//! de registros, el lote es el que haya); si no trae, cancelar es un no-op
//! exitoso. El estado resultante se persiste con la misma versión optimista
//! que una resumption normal.

use uuid::Uuid;

use crate::definition::{BackendStepRegistry, ProcessResolver};
use crate::errors::{EngineError, StoreError};
use crate::executor::{BackendStepExecutor, StepRunEnv};
use crate::state::StateKey;
use crate::step::NoopProgress;
use crate::store::{get_state, put_state, StateStore};

use std::sync::Arc;

/// Entrada de una cancelación.
#[derive(Debug, Clone)]
pub struct CancelProcessInput {
    pub process_name: String,
    pub process_id: Option<Uuid>,
}

impl CancelProcessInput {
    pub fn new(process_name: impl Into<String>, process_id: Uuid) -> Self {
        Self { process_name: process_name.into(),
               process_id: Some(process_id) }
    }
}

pub struct ProcessCanceller<S: StateStore> {
    store: S,
    resolver: Arc<dyn ProcessResolver>,
    steps: Arc<BackendStepRegistry>,
}

impl<S: StateStore> ProcessCanceller<S> {
    pub fn new(store: S, resolver: Arc<dyn ProcessResolver>, steps: Arc<BackendStepRegistry>) -> Self {
        Self { store, resolver, steps }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cancel(&self, input: CancelProcessInput) -> Result<(), EngineError> {
        let definition = self.resolver
                             .definition(&input.process_name)
                             .ok_or_else(|| EngineError::ProcessNotFound { name: input.process_name.clone() })?;

        // Sin identificador no hay instancia que apuntar: falla antes de
        // mirar la definición del cancel-step.
        let id = input.process_id
                      .ok_or_else(|| EngineError::MissingProcessId { process: definition.name.clone() })?;

        let Some(cancel_step) = &definition.cancel_step else {
            log::info!("process {} has no cancel step, cancel is a no-op", definition.name);
            return Ok(());
        };

        let key = StateKey::process(id);
        let (mut state, version) =
            get_state(&self.store, &key)?.ok_or_else(|| EngineError::StateNotFound { process: definition.name
                                                                                                        .clone(),
                                                                                     id })?;

        let noop = NoopProgress;
        let env = StepRunEnv { callback: None,
                               record_source: None,
                               progress: &noop };
        let executor = BackendStepExecutor::new(self.steps.as_ref());
        executor.run_body(&definition, &cancel_step.name, &mut state, &env)?;

        state.touch();
        put_state(&self.store, &key, &state, Some(version)).map_err(|e| match e {
            StoreError::Conflict { .. } => EngineError::ConcurrentStateUpdate { process: definition.name.clone() },
            other => EngineError::Store(other),
        })?;
        log::debug!("process {} ({id}) cancelled via step {}", definition.name, cancel_step.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FlowKind, ProcessDefinition, ProcessRegistry, ProcessStep};
    use crate::state::ProcessState;
    use crate::step::{BackendStep, StepInput, StepOutput};
    use crate::store::InMemoryStateStore;
    use serde_json::json;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Undo {
        runs: Arc<AtomicUsize>,
    }
    impl BackendStep for Undo {
        fn name(&self) -> &str {
            "undo"
        }
        fn run(&self, _input: &StepInput<'_>) -> Result<StepOutput, EngineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(StepOutput::new().with_value("cancelled", json!(true)))
        }
    }

    #[test]
    fn cancel_without_cancel_step_is_noop() {
        let registry = ProcessRegistry::new();
        registry.register(ProcessDefinition::new("plain", FlowKind::Linear).add_step(ProcessStep::backend("a")));
        let canceller =
            ProcessCanceller::new(InMemoryStateStore::new(), Arc::new(registry), Arc::new(BackendStepRegistry::new()));
        canceller.cancel(CancelProcessInput::new("plain", Uuid::new_v4())).unwrap();
    }

    #[test]
    fn cancel_runs_the_cancel_step_body() {
        let registry = ProcessRegistry::new();
        registry.register(ProcessDefinition::new("undoable", FlowKind::Linear)
            .add_step(ProcessStep::backend("a"))
            .with_cancel_step(ProcessStep::backend("undo")));
        let runs = Arc::new(AtomicUsize::new(0));
        let steps = BackendStepRegistry::new();
        steps.register(Undo { runs: Arc::clone(&runs) });

        let store = InMemoryStateStore::new();
        let id = Uuid::new_v4();
        put_state(&store, &StateKey::process(id), &ProcessState::new(), None).unwrap();

        let canceller = ProcessCanceller::new(store, Arc::new(registry), Arc::new(steps));
        canceller.cancel(CancelProcessInput::new("undoable", id)).unwrap();

        let (state, version) = get_state(canceller.store(), &StateKey::process(id)).unwrap().unwrap();
        assert_eq!(state.value("cancelled"), Some(&json!(true)));
        assert_eq!(runs.load(Ordering::SeqCst), 1, "cancel step runs exactly once");
        assert_eq!(version, 2);
    }

    #[test]
    fn cancel_without_id_is_an_input_error() {
        let registry = ProcessRegistry::new();
        registry.register(ProcessDefinition::new("undoable", FlowKind::Linear)
            .with_cancel_step(ProcessStep::backend("undo")));
        // El identificador se exige aun cuando el proceso no declara
        // cancel-step: no hay instancia que apuntar.
        registry.register(ProcessDefinition::new("plain", FlowKind::Linear).add_step(ProcessStep::backend("a")));
        let canceller =
            ProcessCanceller::new(InMemoryStateStore::new(), Arc::new(registry), Arc::new(BackendStepRegistry::new()));

        let err = canceller.cancel(CancelProcessInput { process_name: "undoable".into(), process_id: None })
                           .unwrap_err();
        assert!(matches!(err, EngineError::MissingProcessId { .. }));

        let err = canceller.cancel(CancelProcessInput { process_name: "plain".into(), process_id: None })
                           .unwrap_err();
        assert!(matches!(err, EngineError::MissingProcessId { .. }));
    }
}
