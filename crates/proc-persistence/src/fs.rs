//! Implementación del `StateStore` sobre archivos JSON.
//!
//! Un archivo por clave (`{kind}-{uuid}.json`) con el payload y su versión.
//! La escritura es read-modify-write bajo un lock interno, con volcado a un
//! archivo temporal y rename atómico para que un lector nunca vea un estado
//! a medio escribir. El barrido de retención (`sweep_expired`) borra estados
//! que no se tocan hace más que el TTL; lo dispara el operador, no el motor.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use proc_core::{StateKey, StateStore, StoreError, StoredState};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::PersistenceError;

pub struct FileStateStore {
    dir: PathBuf,
    // Serializa el read-modify-write del put; el rename final es atómico.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn open(config: &StoreConfig) -> Result<Self, PersistenceError> {
        Self::at_dir(&config.dir)
    }

    pub fn at_dir(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &StateKey) -> PathBuf {
        self.dir.join(format!("{}-{}.json", key.kind.as_str(), key.id))
    }

    fn read_stored(&self, path: &Path) -> Result<Option<StoredState>, PersistenceError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored = serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt { path: path.to_path_buf(),
                                                                                            reason: e.to_string() })?;
        Ok(Some(stored))
    }

    fn write_stored(&self, path: &Path, stored: &StoredState) -> Result<(), PersistenceError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(stored)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Borra los estados cuya última escritura es más vieja que el TTL.
    /// Devuelve la cantidad de archivos eliminados.
    pub fn sweep_expired(&self, ttl: Duration) -> Result<usize, PersistenceError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let age = modified.elapsed().unwrap_or_default();
            if age >= ttl {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("swept {removed} expired state file(s) from {}", self.dir.display());
        }
        Ok(removed)
    }
}

impl StateStore for FileStateStore {
    fn put(&self, key: &StateKey, payload: &Value, expected_version: Option<u64>) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for(key);
        let current = self.read_stored(&path).map_err(StoreError::from)?.map(|s| s.version).unwrap_or(0);
        if let Some(expected) = expected_version {
            if expected != current || current == 0 {
                return Err(StoreError::Conflict { expected, actual: current });
            }
        }
        let version = current + 1;
        self.write_stored(&path, &StoredState { payload: payload.clone(), version })
            .map_err(StoreError::from)?;
        Ok(version)
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredState>, StoreError> {
        self.read_stored(&self.path_for(key)).map_err(StoreError::from)
    }
}
