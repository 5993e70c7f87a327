//! Scoped subscription that keeps a cached config value fresh.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{ConfigObserver, ConfigStore, ObserverId};

/// Live subscription to one integer key.
///
/// Every change notification re-reads the key and overwrites the shared
/// cache. Dropping the subscription deregisters it from the store.
pub struct ConfigSubscription {
    store: Arc<dyn ConfigStore>,
    key: String,
    id: ObserverId,
    cache: Arc<AtomicI64>,
}

impl ConfigSubscription {
    /// Load the current value of `key` into `cache`, then subscribe so every
    /// notification refreshes it.
    ///
    /// If the key cannot be read yet the cache keeps its value until the
    /// first notification or [`refresh`](Self::refresh).
    pub fn int(store: Arc<dyn ConfigStore>, key: impl Into<String>, cache: Arc<AtomicI64>) -> Self {
        let key = key.into();
        match store.read_int(&key) {
            Ok(value) => cache.store(value, Ordering::Release),
            Err(e) => warn!(key = %key, error = %e, "config value not readable at subscribe, keeping cached"),
        }
        let refresher = Arc::new(IntRefresher {
            cache: Arc::clone(&cache),
        });
        let id = store.subscribe(&key, refresher);
        Self { store, key, id, cache }
    }

    /// Re-read the key now and update the cache.
    pub fn refresh(&self) -> Result<i64> {
        let value = self.store.read_int(&self.key)?;
        self.cache.store(value, Ordering::Release);
        Ok(value)
    }

    /// The cached value.
    pub fn get(&self) -> i64 {
        self.cache.load(Ordering::Acquire)
    }

    /// Subscribed key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ConfigSubscription {
    fn drop(&mut self) {
        let removed = self.store.unsubscribe(&self.key, self.id);
        debug!(key = %self.key, removed, "config subscription released");
    }
}

struct IntRefresher {
    cache: Arc<AtomicI64>,
}

impl ConfigObserver for IntRefresher {
    fn config_updated(&self, key: &str, store: &dyn ConfigStore) {
        match store.read_int(key) {
            Ok(value) => {
                let previous = self.cache.swap(value, Ordering::AcqRel);
                info!(key = %key, previous, current = value, "config value reloaded");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "failed to reload config value, keeping previous");
            }
        }
    }
}
