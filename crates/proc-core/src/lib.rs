//! # proc-core
//!
//! Motor de ejecución de procesos resumibles, agnóstico del dominio.
//!
//! Un proceso es una secuencia nombrada de steps frontend (interacción de
//! usuario, el motor se detiene y reporta) y backend (lógica de servidor,
//! el motor los ejecuta). Cada invocación es stateless: el estado vive en
//! un `StateStore` versionado y el caller retoma con el identificador del
//! proceso más el marcador "después del step X".
//!
//! Piezas principales:
//! - `definition` — definiciones inmutables, resolver y registries.
//! - `state` / `store` — estado del proceso y persistencia key/value con
//!   versión optimista.
//! - `step` — contrato de steps backend (vista de entrada de sólo lectura,
//!   output de sólo escritura, plan de mutación).
//! - `executor` — corre un step y mergea su output al estado.
//! - `driver` — caminata lineal o state-machine, política frontend,
//!   límite de loops backend.
//! - `cancel` — cancelación con cancel-step opcional.
//! - `job` — ejecución asíncrona con progreso consultable.

pub mod cancel;
pub mod definition;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod job;
pub mod state;
pub mod step;
pub mod store;

pub use cancel::{CancelProcessInput, ProcessCanceller};
pub use definition::{BackendStepRegistry, FlowKind, ProcessDefinition, ProcessRegistry, ProcessResolver,
                     ProcessStep, StepKind};
pub use driver::{FrontendStepBehavior, ProcessDriver, RunProcessInput, RunProcessOutput,
                 DEFAULT_STACK_DEPTH_LIMIT, VALUE_STACK_DEPTH_LIMIT};
pub use errors::{EngineError, StoreError};
pub use executor::{BackendStepExecutor, MergeOutcome, StepRunEnv};
pub use job::{job_snapshot, JobProgress, JobSnapshot, JobStatus, ProcessJobHandle, WatchProgress};
pub use state::{ProcessState, StateKey, StateKind};
pub use step::{BackendStep, NoopProgress, ProcessCallback, ProgressSink, StepInput, StepOutput, StepPlan};
pub use store::{get_state, put_state, InMemoryStateStore, StateStore, StoredState};
