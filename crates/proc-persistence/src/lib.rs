//! # proc-persistence
//!
//! Implementación durable del `StateStore` del motor: un archivo JSON por
//! estado, con versión optimista y retención por TTL. Pensada para
//! despliegues de un solo nodo y para tests de integración; la
//! implementación en memoria vive en el core.
//!
//! Módulos:
//! - `fs`: store sobre archivos con escritura atómica y barrido de TTL.
//! - `config`: carga de configuración desde .env.
//! - `error`: mapeo de errores de IO/serialización al contrato del motor.

pub mod config;
pub mod error;
pub mod fs;

pub use config::{init_dotenv, StoreConfig};
pub use error::PersistenceError;
pub use fs::FileStateStore;
