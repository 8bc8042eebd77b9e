//! Contrato de persistencia de estado (`StateStore`) e implementación en
//! memoria.
//!
//! El store es key/value: clave = `StateKey` (uuid + tipo), valor = JSON
//! opaco con versión. La versión implementa locking optimista: quien escribe
//! declara la versión que observó al leer; si no coincide, la escritura
//! falla con `StoreError::Conflict` y el caller debe recargar. Así dos
//! resumptions concurrentes sobre el mismo identificador tienen un ganador
//! definido en lugar de pisarse silenciosamente.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;
use crate::state::{ProcessState, StateKey};

/// Estado almacenado: payload JSON + versión monótona (1, 2, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    pub payload: Value,
    pub version: u64,
}

pub trait StateStore: Send + Sync {
    /// Escribe el payload bajo la clave.
    ///
    /// - `expected_version: None` — creación u overwrite incondicional.
    /// - `expected_version: Some(v)` — la clave debe existir con versión `v`;
    ///   de lo contrario `StoreError::Conflict`.
    ///
    /// Devuelve la nueva versión.
    fn put(&self, key: &StateKey, payload: &Value, expected_version: Option<u64>) -> Result<u64, StoreError>;

    fn get(&self, key: &StateKey) -> Result<Option<StoredState>, StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    fn put(&self, key: &StateKey, payload: &Value, expected_version: Option<u64>) -> Result<u64, StoreError> {
        (**self).put(key, payload, expected_version)
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredState>, StoreError> {
        (**self).get(key)
    }
}

/// Serializa y escribe un `ProcessState` tipado.
pub fn put_state(store: &dyn StateStore,
                 key: &StateKey,
                 state: &ProcessState,
                 expected_version: Option<u64>)
                 -> Result<u64, StoreError> {
    let payload = serde_json::to_value(state).map_err(|e| StoreError::Serde(e.to_string()))?;
    store.put(key, &payload, expected_version)
}

/// Lee y deserializa un `ProcessState` tipado junto con su versión.
pub fn get_state(store: &dyn StateStore, key: &StateKey) -> Result<Option<(ProcessState, u64)>, StoreError> {
    match store.get(key)? {
        None => Ok(None),
        Some(stored) => {
            let state: ProcessState =
                serde_json::from_value(stored.payload).map_err(|e| StoreError::Serde(e.to_string()))?;
            Ok(Some((state, stored.version)))
        }
    }
}

/// Store en memoria sobre DashMap (tests, demos y procesos efímeros).
pub struct InMemoryStateStore {
    inner: DashMap<StateKey, StoredState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn put(&self, key: &StateKey, payload: &Value, expected_version: Option<u64>) -> Result<u64, StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.inner.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().version;
                if let Some(expected) = expected_version {
                    if expected != current {
                        return Err(StoreError::Conflict { expected, actual: current });
                    }
                }
                let version = current + 1;
                occupied.insert(StoredState { payload: payload.clone(), version });
                Ok(version)
            }
            Entry::Vacant(vacant) => {
                if let Some(expected) = expected_version {
                    return Err(StoreError::Conflict { expected, actual: 0 });
                }
                vacant.insert(StoredState { payload: payload.clone(), version: 1 });
                Ok(1)
            }
        }
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredState>, StoreError> {
        Ok(self.inner.get(key).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn versions_grow_monotonically() {
        let store = InMemoryStateStore::new();
        let key = StateKey::process(Uuid::new_v4());
        assert_eq!(store.put(&key, &json!({"a": 1}), None).unwrap(), 1);
        assert_eq!(store.put(&key, &json!({"a": 2}), Some(1)).unwrap(), 2);
        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.payload, json!({"a": 2}));
    }

    #[test]
    fn stale_version_conflicts() {
        let store = InMemoryStateStore::new();
        let key = StateKey::process(Uuid::new_v4());
        store.put(&key, &json!({}), None).unwrap();
        store.put(&key, &json!({}), Some(1)).unwrap();
        let err = store.put(&key, &json!({}), Some(1)).unwrap_err();
        assert_eq!(err, StoreError::Conflict { expected: 1, actual: 2 });
    }

    #[test]
    fn expected_version_on_missing_key_conflicts() {
        let store = InMemoryStateStore::new();
        let key = StateKey::process(Uuid::new_v4());
        let err = store.put(&key, &json!({}), Some(3)).unwrap_err();
        assert_eq!(err, StoreError::Conflict { expected: 3, actual: 0 });
    }

    #[test]
    fn typed_roundtrip() {
        let store = InMemoryStateStore::new();
        let key = StateKey::process(Uuid::new_v4());
        let mut state = ProcessState::new();
        state.set_value("foo", json!("fubu"));
        state.step_list = vec!["a".into(), "b".into()];
        put_state(&store, &key, &state, None).unwrap();

        let (loaded, version) = get_state(&store, &key).unwrap().unwrap();
        assert_eq!(version, 1);
        assert_eq!(loaded.value("foo"), Some(&json!("fubu")));
        assert_eq!(loaded.step_list, vec!["a".to_string(), "b".to_string()]);
    }
}
