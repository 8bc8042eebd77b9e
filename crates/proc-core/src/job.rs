//! Ejecución asíncrona de procesos con canal de progreso.
//!
//! Un proceso largo (p.ej. carga masiva) corre en un task bloqueante; el
//! caller conserva un handle con el que puede consultar el progreso
//! incremental (actual/total vía canal watch) y esperar el resultado final.
//! Además se persiste un snapshot del job bajo `StateKey::async_job` para
//! pollers externos que sólo conocen el identificador.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::driver::{ProcessDriver, RunProcessInput, RunProcessOutput};
use crate::errors::EngineError;
use crate::state::StateKey;
use crate::step::ProgressSink;
use crate::store::StateStore;

/// Progreso incremental de un job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: u64,
    pub total: Option<u64>,
    pub done: bool,
}

/// Estado persistido de un job asíncrono, consultable por pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub process_name: String,
    pub status: JobStatus,
    pub process_id: Option<Uuid>,
    pub next_step_name: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Sink de progreso respaldado por un canal watch compartible entre el task
/// del job y los consumidores del handle.
pub struct WatchProgress {
    tx: Arc<watch::Sender<JobProgress>>,
}

impl ProgressSink for WatchProgress {
    fn update(&self, current: u64, total: Option<u64>) {
        self.tx.send_modify(|p| {
                   p.current = current;
                   p.total = total;
               });
    }
}

/// Handle de un job en vuelo: progreso consultable + espera del resultado.
pub struct ProcessJobHandle {
    pub job_id: Uuid,
    rx: watch::Receiver<JobProgress>,
    join: tokio::task::JoinHandle<Result<RunProcessOutput, EngineError>>,
}

impl ProcessJobHandle {
    /// Último progreso reportado.
    pub fn progress(&self) -> JobProgress {
        self.rx.borrow().clone()
    }

    /// Espera a que el progreso cambie y devuelve el valor nuevo.
    pub async fn progress_changed(&mut self) -> Option<JobProgress> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow().clone()),
            Err(_) => None,
        }
    }

    /// Espera el resultado final del job.
    pub async fn join(self) -> Result<RunProcessOutput, EngineError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Internal(format!("job task failed: {e}"))),
        }
    }
}

impl<S: StateStore + 'static> ProcessDriver<S> {
    /// Lanza la ejecución en background y devuelve el handle del job.
    ///
    /// El proceso corre en un task bloqueante; el snapshot del job se
    /// persiste al arrancar y al terminar (una falla al persistir el
    /// snapshot no tumba el job, sólo se loguea).
    pub fn run_async(self: Arc<Self>, mut input: RunProcessInput) -> ProcessJobHandle {
        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(JobProgress::default());
        let tx = Arc::new(tx);
        input.progress = Some(Arc::new(WatchProgress { tx: Arc::clone(&tx) }));

        let driver = self;
        let process_name = input.process_name.clone();
        record_snapshot(driver.store(),
                        &JobSnapshot { job_id,
                                       process_name: process_name.clone(),
                                       status: JobStatus::Running,
                                       process_id: input.process_id,
                                       next_step_name: None,
                                       error: None,
                                       updated_at: Utc::now() });

        let join = tokio::task::spawn_blocking(move || {
            let result = driver.run(input);
            let snapshot = match &result {
                Ok(out) => JobSnapshot { job_id,
                                         process_name,
                                         status: JobStatus::Completed,
                                         process_id: Some(out.process_id),
                                         next_step_name: out.next_step_name.clone(),
                                         error: None,
                                         updated_at: Utc::now() },
                Err(e) => JobSnapshot { job_id,
                                        process_name,
                                        status: JobStatus::Failed,
                                        process_id: None,
                                        next_step_name: None,
                                        error: Some(e.to_string()),
                                        updated_at: Utc::now() },
            };
            record_snapshot(driver.store(), &snapshot);
            tx.send_modify(|p| p.done = true);
            result
        });

        ProcessJobHandle { job_id, rx, join }
    }
}

fn record_snapshot(store: &dyn StateStore, snapshot: &JobSnapshot) {
    let key = StateKey::async_job(snapshot.job_id);
    match serde_json::to_value(snapshot) {
        Ok(payload) => {
            if let Err(e) = store.put(&key, &payload, None) {
                log::warn!("failed to record job snapshot {}: {e}", snapshot.job_id);
            }
        }
        Err(e) => log::warn!("failed to serialize job snapshot {}: {e}", snapshot.job_id),
    }
}

/// Lee el snapshot persistido de un job.
pub fn job_snapshot(store: &dyn StateStore, job_id: Uuid) -> Result<Option<JobSnapshot>, EngineError> {
    match store.get(&StateKey::async_job(job_id))? {
        None => Ok(None),
        Some(stored) => {
            let snapshot = serde_json::from_value(stored.payload).map_err(|e| EngineError::Internal(e.to_string()))?;
            Ok(Some(snapshot))
        }
    }
}
