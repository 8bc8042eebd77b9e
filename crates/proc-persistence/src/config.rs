//! Carga de configuración del store desde variables de entorno.
//! Usa convención `PROCFLOW_STATE_DIR` y TTL opcional de retención.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
    /// Retención de estados inactivos; `None` = sin barrido.
    pub ttl: Option<Duration>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let dir = env::var("PROCFLOW_STATE_DIR").map(PathBuf::from)
                                                .unwrap_or_else(|_| PathBuf::from("./procflow-state"));
        let ttl = env::var("PROCFLOW_STATE_TTL_SECONDS").ok()
                                                        .and_then(|v| v.parse::<u64>().ok())
                                                        .map(Duration::from_secs);
        Self { dir, ttl }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
