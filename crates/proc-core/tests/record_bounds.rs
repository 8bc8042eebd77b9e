use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use proc_core::{BackendStep, BackendStepRegistry, EngineError, FlowKind, FrontendStepBehavior, InMemoryStateStore,
                ProcessCallback, ProcessDefinition, ProcessDriver, ProcessRegistry, ProcessStep, RunProcessInput,
                StepInput, StepOutput};
use proc_domain::{InMemoryRecordSource, QueryFilter, Record};

struct CountRecords;
impl BackendStep for CountRecords {
    fn name(&self) -> &str {
        "count"
    }
    fn run(&self, input: &StepInput<'_>) -> Result<StepOutput, EngineError> {
        Ok(StepOutput::new().with_value("seen", json!(input.records.len())))
    }
}

fn bounded_process(min: usize, max: usize) -> Arc<ProcessRegistry> {
    let processes = ProcessRegistry::new();
    processes.register(ProcessDefinition::new("bulk", FlowKind::Linear)
        .add_step(ProcessStep::backend("count"))
        .with_input_fields(&["name", "serial"])
        .with_min_input_records(min)
        .with_max_input_records(max));
    Arc::new(processes)
}

fn driver(processes: Arc<ProcessRegistry>) -> ProcessDriver<InMemoryStateStore> {
    let steps = BackendStepRegistry::new();
    steps.register(CountRecords);
    ProcessDriver::new(InMemoryStateStore::new(), processes, Arc::new(steps))
}

fn rec(name: &str, serial: i64) -> Record {
    Record::new().with_value("name", json!(name)).with_value("serial", json!(serial))
}

#[test]
fn explicit_batch_within_bounds_runs() {
    let driver = driver(bounded_process(1, 3));
    let out = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_records(vec![rec("a", 1), rec("b", 2)]))
                    .unwrap();
    assert_eq!(out.values.get("seen"), Some(&json!(2)));
}

#[test]
fn too_few_records_is_a_user_facing_error() {
    let driver = driver(bounded_process(2, 5));
    let err = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_records(vec![rec("a", 1)]))
                    .unwrap_err();
    match &err {
        EngineError::TooFewRecords { min, got } => {
            assert_eq!((*min, *got), (2, 1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_user_facing());
}

#[test]
fn too_many_records_is_a_user_facing_error() {
    let driver = driver(bounded_process(1, 2));
    let err = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_records(vec![rec("a", 1), rec("b", 2), rec("c", 3)]))
                    .unwrap_err();
    assert!(matches!(err, EngineError::TooManyRecords { max: 2, got: 3 }));
    assert!(err.is_user_facing());
}

#[test]
fn empty_batch_is_materialized_from_the_callback_query() {
    struct ByName;
    impl ProcessCallback for ByName {
        fn query_filter(&self) -> Option<QueryFilter> {
            Some(QueryFilter::new().equals("name", json!("match")))
        }
    }

    let source = InMemoryRecordSource::new();
    source.seed(vec![rec("match", 1), rec("other", 2), rec("match", 3)]);

    let driver = driver(bounded_process(1, 10));
    let out = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_callback(Arc::new(ByName))
                .with_record_source(Arc::new(source)))
                    .unwrap();
    assert_eq!(out.values.get("seen"), Some(&json!(2)));
}

#[test]
fn callback_field_values_build_a_single_record() {
    struct Direct;
    impl ProcessCallback for Direct {
        fn field_values(&self, fields: &[String]) -> HashMap<String, Value> {
            let mut values = HashMap::new();
            for field in fields {
                match field.as_str() {
                    "name" => {
                        values.insert(field.clone(), json!("solo"));
                    }
                    "serial" => {
                        values.insert(field.clone(), json!(7));
                    }
                    _ => {}
                }
            }
            values
        }
    }

    let driver = driver(bounded_process(1, 1));
    let out = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_callback(Arc::new(Direct)))
                    .unwrap();
    assert_eq!(out.values.get("seen"), Some(&json!(1)));
}

#[test]
fn bounds_apply_to_the_materialized_batch_as_rows_come_and_go() {
    struct Everything;
    impl ProcessCallback for Everything {
        fn query_filter(&self) -> Option<QueryFilter> {
            Some(QueryFilter::new())
        }
    }

    let source = Arc::new(InMemoryRecordSource::new());
    source.seed((0..3).map(|i| rec(&format!("r{i}"), i)).collect());

    // Mínimo 5 contra 3 filas existentes: rechazado.
    let wide = driver(bounded_process(5, 100));
    let err = wide.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                  .with_callback(Arc::new(Everything))
                  .with_record_source(Arc::clone(&source) as Arc<dyn proc_domain::RecordSource>))
                  .unwrap_err();
    assert!(matches!(err, EngineError::TooFewRecords { min: 5, got: 3 }));

    // Con 10 filas el mínimo se cumple.
    source.seed((3..10).map(|i| rec(&format!("r{i}"), i)).collect());
    let out = wide.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                  .with_callback(Arc::new(Everything))
                  .with_record_source(Arc::clone(&source) as Arc<dyn proc_domain::RecordSource>))
                  .unwrap();
    assert_eq!(out.values.get("seen"), Some(&json!(10)));

    // Un máximo de 8 vuelve a rechazar el mismo lote.
    let tight = driver(bounded_process(5, 8));
    let err = tight.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                   .with_callback(Arc::new(Everything))
                   .with_record_source(source as Arc<dyn proc_domain::RecordSource>))
                   .unwrap_err();
    assert!(matches!(err, EngineError::TooManyRecords { max: 8, got: 10 }));
}

#[test]
fn callback_with_nothing_to_offer_still_trips_the_minimum() {
    struct EmptyHanded;
    impl ProcessCallback for EmptyHanded {}

    let driver = driver(bounded_process(1, 10));
    let err = driver.run(RunProcessInput::new("bulk", FrontendStepBehavior::Break)
                .with_callback(Arc::new(EmptyHanded)))
                    .unwrap_err();
    assert!(matches!(err, EngineError::TooFewRecords { min: 1, got: 0 }));
}
