//! Observable configuration store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;
use ulid::Ulid;

use crate::document::GpuConfig;
use crate::error::{ConfigError, Result};
use crate::value::{ConfigValue, GPU_ENABLE, GPU_SEARCH_DEVICES, GPU_SEARCH_THRESHOLD};

/// Identifies one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Ulid);

impl ObserverId {
    /// Generate a new ObserverId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Receives change notifications for a subscribed key.
pub trait ConfigObserver: Send + Sync {
    /// Called after `key` changed. The store is passed in so the observer
    /// can re-read the current value; no store locks are held.
    fn config_updated(&self, key: &str, store: &dyn ConfigStore);
}

/// Configuration store abstraction.
///
/// This trait lets the scheduler run against any key/value backend that
/// can notify on change.
pub trait ConfigStore: Send + Sync {
    /// Read the current value of a key.
    fn read(&self, key: &str) -> Result<ConfigValue>;

    /// Register an observer for one key.
    fn subscribe(&self, key: &str, observer: Arc<dyn ConfigObserver>) -> ObserverId;

    /// Remove an observer. Returns false if it was not registered.
    fn unsubscribe(&self, key: &str, id: ObserverId) -> bool;

    /// Read a key as a bool.
    fn read_bool(&self, key: &str) -> Result<bool> {
        self.read(key)?.as_bool().ok_or_else(|| ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "bool",
        })
    }

    /// Read a key as an integer.
    fn read_int(&self, key: &str) -> Result<i64> {
        self.read(key)?.as_int().ok_or_else(|| ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "int",
        })
    }

    /// Read a key as a list of strings.
    fn read_list(&self, key: &str) -> Result<Vec<String>> {
        match self.read(key)? {
            ConfigValue::List(items) => Ok(items),
            _ => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "list",
            }),
        }
    }
}

type ObserverList = Vec<(ObserverId, Arc<dyn ConfigObserver>)>;

/// In-process configuration store.
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, ConfigValue>>,
    observers: Mutex<HashMap<String, ObserverList>>,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store holding the GPU section of a config document.
    pub fn from_config(gpu: &GpuConfig) -> Self {
        let store = Self::new();
        store.apply(gpu);
        store
    }

    /// Set a key. Observers of that key are notified if the value changed.
    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        let changed = {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match values.insert(key.to_string(), value.clone()) {
                Some(previous) => previous != value,
                None => true,
            }
        };

        if changed {
            debug!(key = %key, value = %value, "config value changed");
            self.notify(key);
        }
    }

    /// Write every GPU key from a config document section.
    pub fn apply(&self, gpu: &GpuConfig) {
        self.set(GPU_ENABLE, gpu.enable);
        self.set(GPU_SEARCH_THRESHOLD, gpu.gpu_search_threshold);
        self.set(GPU_SEARCH_DEVICES, gpu.search_devices.clone());
    }

    /// Number of observers registered for a key.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }

    fn notify(&self, key: &str) {
        // Snapshot the list so observers can call back into the store.
        let observers: Vec<Arc<dyn ConfigObserver>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|list| list.iter().map(|(_, o)| Arc::clone(o)).collect())
            .unwrap_or_default();

        for observer in observers {
            observer.config_updated(key, self);
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn read(&self, key: &str) -> Result<ConfigValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    fn subscribe(&self, key: &str, observer: Arc<dyn ConfigObserver>) -> ObserverId {
        let id = ObserverId::new();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push((id, observer));
        debug!(key = %key, observer = %id, "observer subscribed");
        id
    }

    fn unsubscribe(&self, key: &str, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = observers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            observers.remove(key);
        }
        if removed {
            debug!(key = %key, observer = %id, "observer unsubscribed");
        }
        removed
    }
}
