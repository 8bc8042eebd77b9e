//! Ejecución de un step backend contra el `ProcessState`.
//!
//! Responsabilidades:
//! - Materializar el lote de registros vía callback cuando el proceso
//!   declara bounds y el caller no suministró registros.
//! - Validar min/max de registros de entrada (errores orientados al
//!   usuario).
//! - Correr el cuerpo del step con vista de sólo lectura y mergear su output
//!   (valores, registros, plan, next-step) en un paso explícito.
//! - Envolver cualquier falla del cuerpo con el contexto proceso/step.

use proc_domain::{Record, RecordSource};

use crate::definition::{BackendStepRegistry, ProcessDefinition};
use crate::errors::EngineError;
use crate::state::ProcessState;
use crate::step::{ProcessCallback, ProgressSink, StepInput};

/// Colaboradores externos disponibles durante una invocación.
pub struct StepRunEnv<'a> {
    pub callback: Option<&'a dyn ProcessCallback>,
    pub record_source: Option<&'a dyn RecordSource>,
    pub progress: &'a dyn ProgressSink,
}

/// Resultado del merge del output de un step sobre el estado.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// El step reemplazó la lista de steps restante.
    pub plan_applied: bool,
    /// Próximo step pedido explícitamente (state-machine).
    pub next_step_name: Option<String>,
}

pub struct BackendStepExecutor<'a> {
    steps: &'a BackendStepRegistry,
}

impl<'a> BackendStepExecutor<'a> {
    pub fn new(steps: &'a BackendStepRegistry) -> Self {
        Self { steps }
    }

    /// Camino normal: bounds + cuerpo + merge.
    pub fn run_step(&self,
                    definition: &ProcessDefinition,
                    step_name: &str,
                    state: &mut ProcessState,
                    env: &StepRunEnv<'_>)
                    -> Result<MergeOutcome, EngineError> {
        self.ensure_records(definition, state, env)?;
        self.run_body(definition, step_name, state, env)
    }

    /// Corre el cuerpo sin validación de bounds (lo usa la cancelación, que
    /// opera sobre el lote que el estado ya tenga).
    pub fn run_body(&self,
                    definition: &ProcessDefinition,
                    step_name: &str,
                    state: &mut ProcessState,
                    env: &StepRunEnv<'_>)
                    -> Result<MergeOutcome, EngineError> {
        let step = self.steps
                       .get(step_name)
                       .ok_or_else(|| EngineError::StepNotFound { process: definition.name.clone(),
                                                                  step: step_name.to_string() })?;

        let input = StepInput { process_name: &definition.name,
                                step_name,
                                values: &state.values,
                                records: &state.records,
                                is_step_back: state.is_step_back,
                                progress: env.progress };

        let output = step.run(&input)
                         .map_err(|e| EngineError::StepExecution { process: definition.name.clone(),
                                                                   step: step_name.to_string(),
                                                                   message: e.to_string() })?;

        // Merge explícito: el estado sólo cambia aquí.
        state.values.extend(output.values);
        if let Some(records) = output.records {
            state.records = records;
        }
        let mut outcome = MergeOutcome { plan_applied: false,
                                         next_step_name: output.next_step_name };
        if let Some(plan) = output.plan {
            if let Some(list) = plan.new_step_list {
                state.step_list = list;
                outcome.plan_applied = true;
            }
            if let Some(over) = plan.override_last_step {
                state.override_last_step_name = Some(over);
            }
        }
        Ok(outcome)
    }

    /// Con bounds configurados: materializa el lote si hace falta y valida
    /// su tamaño contra min/max.
    fn ensure_records(&self,
                      definition: &ProcessDefinition,
                      state: &mut ProcessState,
                      env: &StepRunEnv<'_>)
                      -> Result<(), EngineError> {
        if !definition.has_record_bounds() {
            return Ok(());
        }

        if state.records.is_empty() {
            if let Some(callback) = env.callback {
                if let (Some(filter), Some(source)) = (callback.query_filter(), env.record_source) {
                    state.records = source.query(&filter)?;
                } else {
                    let values = callback.field_values(&definition.input_fields);
                    if !values.is_empty() {
                        let mut record = Record::new();
                        for (field, value) in values {
                            record.set_value(field, value);
                        }
                        state.records = vec![record];
                    }
                }
            }
        }

        let got = state.records.len();
        if let Some(min) = definition.min_input_records {
            if got < min {
                return Err(EngineError::TooFewRecords { min, got });
            }
        }
        if let Some(max) = definition.max_input_records {
            if got > max {
                return Err(EngineError::TooManyRecords { max, got });
            }
        }
        Ok(())
    }
}
