//! proc-domain: registros, filtros y utilidades de lote.
//!
//! Este crate define los objetos de dominio que el motor de procesos mueve
//! entre steps: el `Record` (fila con valores ordenados y mensajes por
//! registro), el modelo mínimo de filtros (`QueryFilter`), el contrato de
//! acceso a datos (`RecordSource`) con una implementación en memoria para
//! pruebas, los hooks de customización pre-insert/pre-update y el resumen
//! estructurado de un proceso de carga masiva (`ProcessSummaryLine`).
//!
//! Diseño resumido:
//! - Errores y warnings se acumulan POR registro; un registro inválido nunca
//!   aborta el lote completo.
//! - El resumen agrupa mensajes idénticos y conserva las claves de los
//!   registros afectados, para que una UI pueda mostrar "N filas fallaron
//!   por X" con drill-down.

pub mod customizer;
pub mod errors;
pub mod filter;
pub mod record;
pub mod source;
pub mod summary;
pub mod unique_key;

pub use customizer::{apply_pre_insert, RecordCustomizer};
pub use errors::DomainError;
pub use filter::{Criterion, Operator, QueryFilter};
pub use record::{Record, Status};
pub use source::{InMemoryRecordSource, RecordSource};
pub use summary::{summarize_batch, ProcessSummaryLine, SummaryAccumulator};
pub use unique_key::UniqueKeyCheck;
