//! Demo ejecutable del motor: un asistente de carga masiva de equipos.
//!
//! Simula las invocaciones que haría una UI: arranca el proceso, se detiene
//! en cada step frontend, "atiende" la pantalla y retoma con los valores
//! capturados. Incluye la mutación del plan (el camino corto descarta la
//! pantalla de revisión) y el resumen por registro al final.

use std::sync::Arc;

use serde_json::json;

use proc_core::{BackendStep, BackendStepRegistry, EngineError, FlowKind, FrontendStepBehavior, InMemoryStateStore,
                ProcessDefinition, ProcessDriver, ProcessRegistry, ProcessStep, RunProcessInput, StepInput,
                StepOutput};
use proc_domain::{apply_pre_insert, InMemoryRecordSource, Record, RecordCustomizer, RecordSource,
                  SummaryAccumulator, UniqueKeyCheck};

/// Decide el camino según la cantidad de registros: lotes chicos saltan la
/// pantalla de revisión.
struct ChoosePath;
impl BackendStep for ChoosePath {
    fn name(&self) -> &str {
        "choose-path"
    }
    fn run(&self, input: &StepInput<'_>) -> Result<StepOutput, EngineError> {
        let out = StepOutput::new();
        if input.records.len() <= 2 {
            Ok(out.with_new_step_list(vec!["load".into(), "done-screen".into()]))
        } else {
            Ok(out)
        }
    }
}

/// Valida unicidad, inserta los registros limpios y deja el resumen en los
/// valores del proceso.
struct Load {
    source: Arc<InMemoryRecordSource>,
}
impl BackendStep for Load {
    fn name(&self) -> &str {
        "load"
    }
    fn run(&self, input: &StepInput<'_>) -> Result<StepOutput, EngineError> {
        let chain: Vec<Box<dyn RecordCustomizer>> = vec![Box::new(UniqueKeyCheck::new(&["uuid"]))];
        let mut records = input.records.to_vec();
        let inserted = apply_pre_insert(&chain, &mut records, self.source.as_ref())?;

        let clean: Vec<Record> = records.iter().filter(|r| !r.has_errors()).cloned().collect();
        self.source.insert(clean).map_err(EngineError::from)?;

        let mut summary = SummaryAccumulator::new();
        for (i, record) in records.iter().enumerate() {
            input.progress.update(i as u64 + 1, Some(records.len() as u64));
            summary.add_record(record, "uuid", i, "loaded");
        }

        Ok(StepOutput::new().with_value("inserted", json!(inserted))
                            .with_value("summary",
                                        serde_json::to_value(summary.into_lines())
                                            .map_err(|e| EngineError::Internal(e.to_string()))?)
                            .with_records(records))
    }
}

fn equipment_process() -> ProcessDefinition {
    ProcessDefinition::new("equipment-bulk-load", FlowKind::Linear)
        .add_step(ProcessStep::frontend("upload-screen"))
        .add_step(ProcessStep::backend("choose-path"))
        .add_step(ProcessStep::frontend("review-screen"))
        .add_step(ProcessStep::backend("load"))
        .add_step(ProcessStep::frontend("done-screen"))
        .with_min_input_records(1)
        .with_max_input_records(100)
}

fn rec(uuid: &str, name: &str) -> Record {
    Record::new().with_value("uuid", json!(uuid)).with_value("name", json!(name))
}

fn main() -> Result<(), EngineError> {
    let source = Arc::new(InMemoryRecordSource::new());
    source.seed(vec![rec("eq-0", "Preexisting pump")]);

    let processes = ProcessRegistry::new();
    processes.register(equipment_process());
    let steps = BackendStepRegistry::new();
    steps.register(ChoosePath);
    steps.register(Load { source: Arc::clone(&source) });

    let driver = ProcessDriver::new(InMemoryStateStore::new(), Arc::new(processes), Arc::new(steps));

    // Invocación 1: el proceso se detiene en la pantalla de carga.
    let halted = driver.run(RunProcessInput::new("equipment-bulk-load", FrontendStepBehavior::Break))?;
    println!("halted at: {:?}", halted.next_step_name);

    // Invocación 2: la UI "subió" dos registros (uno duplica un existente) y
    // retoma. El lote chico hace que choose-path descarte la revisión.
    let batch = vec![rec("eq-1", "Compressor"), rec("eq-0", "Duplicate pump")];
    let done = driver.run(RunProcessInput::new("equipment-bulk-load", FrontendStepBehavior::Break)
                  .with_process_id(halted.process_id)
                  .resume_after("upload-screen")
                  .with_records(batch))?;

    println!("halted at: {:?}", done.next_step_name);
    if let Some(new_screens) = &done.updated_frontend_steps {
        println!("screens after re-plan: {new_screens:?}");
    }
    println!("inserted: {}", done.values.get("inserted").unwrap_or(&json!(0)));
    if let Some(summary) = done.values.get("summary") {
        println!("summary: {summary:#}");
    }
    println!("rows in source: {}", source.all().len());
    Ok(())
}
