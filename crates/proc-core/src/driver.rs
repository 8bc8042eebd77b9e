//! Driver de procesos: orquesta la caminata de steps sobre invocaciones
//! stateless.
//!
//! Responsabilidades principales:
//! - Resolver o crear el `ProcessState` (nuevo vs. resumption) contra el
//!   `StateStore`.
//! - Caminar la secuencia de steps según el tipo de flujo (lineal o
//!   state-machine), deteniéndose en steps frontend según la política del
//!   caller.
//! - Aplicar mutaciones del plan (reemplazo de lista restante + override) en
//!   la misma invocación y reportar la nueva subsecuencia frontend.
//! - Acotar loops backend→backend en flujos state-machine (límite
//!   configurable, default 20).
//! - Persistir el estado con versión optimista: dos resumptions
//!   concurrentes sobre el mismo identificador tienen un perdedor explícito
//!   (`ConcurrentStateUpdate`).
//!
//! El resultado de la caminata es un valor explícito (detenido-en /
//! terminal / fallado), nunca excepciones como control de flujo.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use proc_domain::{Record, RecordSource};

use crate::definition::{BackendStepRegistry, FlowKind, ProcessDefinition, ProcessResolver, StepKind};
use crate::errors::{EngineError, StoreError};
use crate::executor::{BackendStepExecutor, StepRunEnv};
use crate::state::{ProcessState, StateKey};
use crate::step::{NoopProgress, ProcessCallback, ProgressSink};
use crate::store::{get_state, put_state, StateStore};

/// Límite por defecto de steps backend encadenados en un flujo
/// state-machine. Convierte un loop sin fin (auto-referencia o referencia
/// mutua) en un fallo acotado.
pub const DEFAULT_STACK_DEPTH_LIMIT: u32 = 20;

/// Valor de entrada con el que el caller puede subir/bajar el límite.
pub const VALUE_STACK_DEPTH_LIMIT: &str = "stackDepthLimit";

/// Política del caller ante un step frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendStepBehavior {
    /// Detenerse y devolver el cursor al caller (ejecución interactiva).
    Break,
    /// Tratar el step frontend como no-op y continuar.
    Skip,
    /// Fallar: el caller (p.ej. ejecución en background) nunca debe quedar
    /// esperando una interacción de usuario en silencio.
    Fail,
}

/// Entrada de una invocación del driver.
pub struct RunProcessInput {
    pub process_name: String,
    pub process_id: Option<Uuid>,
    /// Marcador "retomar después del step X" (nombre del step frontend ya
    /// atendido por el caller).
    pub resume_after_step: Option<String>,
    pub frontend_step_behavior: FrontendStepBehavior,
    /// Valores suministrados por el caller; ganan sobre los persistidos.
    pub values: HashMap<String, Value>,
    /// Lote explícito de registros (si falta y el proceso declara bounds, se
    /// materializa vía callback).
    pub records: Option<Vec<Record>>,
    pub is_step_back: bool,
    pub callback: Option<Arc<dyn ProcessCallback>>,
    pub record_source: Option<Arc<dyn RecordSource>>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl RunProcessInput {
    pub fn new(process_name: impl Into<String>, behavior: FrontendStepBehavior) -> Self {
        Self { process_name: process_name.into(),
               process_id: None,
               resume_after_step: None,
               frontend_step_behavior: behavior,
               values: HashMap::new(),
               records: None,
               is_step_back: false,
               callback: None,
               record_source: None,
               progress: None }
    }

    pub fn with_process_id(mut self, id: Uuid) -> Self {
        self.process_id = Some(id);
        self
    }

    pub fn resume_after(mut self, step: impl Into<String>) -> Self {
        self.resume_after_step = Some(step.into());
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn step_back(mut self) -> Self {
        self.is_step_back = true;
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProcessCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_record_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.record_source = Some(source);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Salida de una invocación: cursor final/detenido + valores actualizados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProcessOutput {
    pub process_id: Uuid,
    /// Ausente = proceso completo; presente = detenido antes de este step
    /// frontend.
    pub next_step_name: Option<String>,
    pub values: HashMap<String, Value>,
    /// Subsecuencia frontend de la nueva lista, SOLO cuando un step mutó el
    /// plan en esta invocación ("lista cambió" vs "lista sin cambios" es
    /// parte del contrato).
    pub updated_frontend_steps: Option<Vec<String>>,
}

/// Resultado interno de la caminata: total e inspeccionable.
struct WalkOutcome {
    halted_at: Option<String>,
    list_updated: bool,
}

pub struct ProcessDriver<S: StateStore> {
    store: S,
    resolver: Arc<dyn ProcessResolver>,
    steps: Arc<BackendStepRegistry>,
}

impl<S: StateStore> ProcessDriver<S> {
    pub fn new(store: S, resolver: Arc<dyn ProcessResolver>, steps: Arc<BackendStepRegistry>) -> Self {
        Self { store, resolver, steps }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ejecuta (o retoma) un proceso hasta completarse o detenerse en un
    /// step frontend.
    pub fn run(&self, input: RunProcessInput) -> Result<RunProcessOutput, EngineError> {
        let definition = self.resolver
                             .definition(&input.process_name)
                             .ok_or_else(|| EngineError::ProcessNotFound { name: input.process_name.clone() })?;

        let (mut state, expected_version, process_id, is_new) = self.load_state(&definition, &input)?;

        if is_new {
            state.step_list = definition.step_names();
        }
        if let Some(records) = &input.records {
            state.records = records.clone();
        }
        // Los valores del caller ganan sobre el estado persistido.
        for (k, v) in &input.values {
            state.values.insert(k.clone(), v.clone());
        }
        state.is_step_back = input.is_step_back;

        let noop = NoopProgress;
        let progress: &dyn ProgressSink = input.progress.as_deref().unwrap_or(&noop);
        let env = StepRunEnv { callback: input.callback.as_deref(),
                               record_source: input.record_source.as_deref(),
                               progress };
        let executor = BackendStepExecutor::new(self.steps.as_ref());

        let walk = match definition.flow {
            FlowKind::Linear => self.walk_linear(&definition, &mut state, &input, &executor, &env)?,
            FlowKind::StateMachine => self.walk_state_machine(&definition, &mut state, &input, &executor, &env)?,
        };

        state.next_step_name = walk.halted_at.clone();
        state.touch();
        put_state(&self.store, &StateKey::process(process_id), &state, expected_version).map_err(|e| match e {
            StoreError::Conflict { .. } => EngineError::ConcurrentStateUpdate { process: definition.name.clone() },
            other => EngineError::Store(other),
        })?;

        let updated_frontend_steps = if walk.list_updated {
            Some(state.step_list
                      .iter()
                      .filter(|n| matches!(definition.step(n).map(|s| s.kind), Some(StepKind::Frontend)))
                      .cloned()
                      .collect())
        } else {
            None
        };

        match &state.next_step_name {
            Some(step) => log::debug!("process {} ({process_id}) halted at frontend step {step}", definition.name),
            None => log::debug!("process {} ({process_id}) completed", definition.name),
        }

        Ok(RunProcessOutput { process_id,
                              next_step_name: state.next_step_name.clone(),
                              values: state.values.clone(),
                              updated_frontend_steps })
    }

    /// Nuevo vs. resumption. Retomar exige estado previo: un marcador de
    /// resume sin estado persistido es un error de no-encontrado.
    fn load_state(&self,
                  definition: &ProcessDefinition,
                  input: &RunProcessInput)
                  -> Result<(ProcessState, Option<u64>, Uuid, bool), EngineError> {
        match input.process_id {
            Some(id) => match get_state(&self.store, &StateKey::process(id))? {
                Some((state, version)) => Ok((state, Some(version), id, false)),
                None if input.resume_after_step.is_some() => {
                    Err(EngineError::StateNotFound { process: definition.name.clone(), id })
                }
                // Identificador pre-acuñado por el caller, sin estado aún:
                // arranque fresco bajo ese id.
                None => Ok((ProcessState::new(), None, id, true)),
            },
            None => Ok((ProcessState::new(), None, Uuid::new_v4(), true)),
        }
    }

    /// Flujo lineal: orden estricto de `step_list`, arrancando después del
    /// marcador de resume (o en el índice 0).
    fn walk_linear(&self,
                   definition: &ProcessDefinition,
                   state: &mut ProcessState,
                   input: &RunProcessInput,
                   executor: &BackendStepExecutor<'_>,
                   env: &StepRunEnv<'_>)
                   -> Result<WalkOutcome, EngineError> {
        let mut queue: VecDeque<String> = match &input.resume_after_step {
            Some(marker) => {
                let pos = state.step_list
                               .iter()
                               .position(|n| n == marker)
                               .ok_or_else(|| EngineError::StepNotFound { process: definition.name.clone(),
                                                                          step: marker.clone() })?;
                state.step_list.iter().skip(pos + 1).cloned().collect()
            }
            None => state.step_list.iter().cloned().collect(),
        };

        let mut list_updated = false;
        loop {
            // Override persistido o recién instalado: salto directo.
            if let Some(target) = state.override_last_step_name.take() {
                while queue.front().map(|f| *f != target).unwrap_or(false) {
                    queue.pop_front();
                }
                if queue.is_empty() {
                    return Err(EngineError::StepNotFound { process: definition.name.clone(), step: target });
                }
            }

            let Some(name) = queue.pop_front() else {
                return Ok(WalkOutcome { halted_at: None, list_updated });
            };

            let step = definition.step(&name)
                                 .ok_or_else(|| EngineError::StepNotFound { process: definition.name.clone(),
                                                                            step: name.clone() })?;
            match step.kind {
                StepKind::Frontend => match input.frontend_step_behavior {
                    FrontendStepBehavior::Break => {
                        return Ok(WalkOutcome { halted_at: Some(name), list_updated });
                    }
                    FrontendStepBehavior::Skip => continue,
                    FrontendStepBehavior::Fail => {
                        return Err(EngineError::FrontendStepNotAllowed { process: definition.name.clone(),
                                                                         step: name });
                    }
                },
                StepKind::Backend => {
                    let outcome = executor.run_step(definition, &name, state, env)?;
                    if outcome.plan_applied {
                        // La nueva lista ES el resto del plan: se recomputa el
                        // próximo punto de detención contra ella.
                        list_updated = true;
                        queue = state.step_list.iter().cloned().collect();
                    }
                }
            }
        }
    }

    /// Flujo state-machine: el próximo step se decide por nombre a partir
    /// del output del step backend, con fallback al default del step;
    /// ausente ambos, el proceso termina. Los encadenamientos
    /// backend→backend se acotan con el límite configurado.
    fn walk_state_machine(&self,
                          definition: &ProcessDefinition,
                          state: &mut ProcessState,
                          input: &RunProcessInput,
                          executor: &BackendStepExecutor<'_>,
                          env: &StepRunEnv<'_>)
                          -> Result<WalkOutcome, EngineError> {
        let limit = state.values
                         .get(VALUE_STACK_DEPTH_LIMIT)
                         .and_then(Value::as_u64)
                         .map(|v| v as u32)
                         .unwrap_or(DEFAULT_STACK_DEPTH_LIMIT);

        // skip_through: al retomar, saltar partes hasta el marcador
        // inclusive, dentro de su step contenedor.
        let mut skip_through: Option<String> = input.resume_after_step.clone();
        let mut current: String = match &skip_through {
            Some(marker) => definition.step_containing(marker)
                                      .ok_or_else(|| EngineError::StepNotFound { process: definition.name.clone(),
                                                                                 step: marker.clone() })?
                                      .name
                                      .clone(),
            None => match state.override_last_step_name.take() {
                Some(target) => target,
                None => definition.steps
                                  .first()
                                  .map(|s| s.name.clone())
                                  .ok_or_else(|| {
                                      EngineError::Internal(format!("process {} has no steps", definition.name))
                                  })?,
            },
        };

        let mut list_updated = false;
        let mut chain_len: u32 = 0;
        let mut prev_was_backend = false;

        loop {
            let step = definition.step(&current)
                                 .ok_or_else(|| EngineError::StepNotFound { process: definition.name.clone(),
                                                                            step: current.clone() })?;
            let mut next_name: Option<String> = None;
            for part in step.parts() {
                if let Some(marker) = &skip_through {
                    if part.name == *marker {
                        skip_through = None;
                    }
                    continue;
                }
                match part.kind {
                    StepKind::Frontend => match input.frontend_step_behavior {
                        FrontendStepBehavior::Break => {
                            return Ok(WalkOutcome { halted_at: Some(part.name.clone()), list_updated });
                        }
                        FrontendStepBehavior::Skip => continue,
                        FrontendStepBehavior::Fail => {
                            return Err(EngineError::FrontendStepNotAllowed { process: definition.name.clone(),
                                                                             step: part.name.clone() });
                        }
                    },
                    StepKind::Backend => {
                        chain_len = if prev_was_backend { chain_len + 1 } else { 1 };
                        if chain_len > limit {
                            return Err(EngineError::StepLoopLimit { process: definition.name.clone(), limit });
                        }
                        let outcome = executor.run_step(definition, &part.name, state, env)?;
                        prev_was_backend = true;
                        if outcome.plan_applied {
                            list_updated = true;
                        }
                        if let Some(n) = outcome.next_step_name {
                            next_name = Some(n);
                        }
                    }
                }
            }

            match next_name.or_else(|| step.default_next_step.clone()) {
                Some(next) => current = next,
                None => return Ok(WalkOutcome { halted_at: None, list_updated }),
            }
        }
    }
}
