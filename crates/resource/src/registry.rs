//! Resource registry trait and in-memory implementation.

use std::collections::HashMap;

use tracing::debug;
use vecsched_core::{DeviceId, ResourceHandle, ResourceKey};

/// Errors from resource lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No resource registered under this key
    #[error("resource not found: {0}")]
    NotFound(String),
}

/// Resolves resource keys to handles.
pub trait ResourceRegistry: Send + Sync {
    /// Look up a resource. Fails with `NotFound` for unknown keys.
    fn lookup(&self, key: &ResourceKey) -> Result<ResourceHandle, RegistryError>;
}

/// Registry backed by a map, for single-node deployments and tests.
pub struct InMemoryRegistry {
    resources: HashMap<ResourceKey, ResourceHandle>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
        }
    }

    /// Registry with the CPU resource and one GPU resource per device.
    pub fn with_devices(devices: &[DeviceId]) -> Self {
        let mut registry = Self::new();
        registry.register(ResourceKey::Cpu);
        for device in devices {
            registry.register(ResourceKey::Gpu(*device));
        }
        registry
    }

    /// Register a resource, returning its handle. Re-registering is a no-op.
    pub fn register(&mut self, key: ResourceKey) -> ResourceHandle {
        self.resources
            .entry(key)
            .or_insert_with(|| {
                debug!(resource = %key, "registered resource");
                ResourceHandle::new(key)
            })
            .clone()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry for InMemoryRegistry {
    fn lookup(&self, key: &ResourceKey) -> Result<ResourceHandle, RegistryError> {
        self.resources
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_devices_registers_cpu_and_gpus() {
        let registry = InMemoryRegistry::with_devices(&[DeviceId(0), DeviceId(1)]);
        assert_eq!(registry.len(), 3);
        assert!(registry.lookup(&ResourceKey::Cpu).unwrap().is_cpu());
        assert_eq!(
            registry.lookup(&ResourceKey::Gpu(DeviceId(1))).unwrap().name(),
            "gpu1"
        );
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let registry = InMemoryRegistry::with_devices(&[DeviceId(0)]);
        let err = registry.lookup(&ResourceKey::Gpu(DeviceId(7))).unwrap_err();
        assert_eq!(err, RegistryError::NotFound("gpu7".to_string()));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = InMemoryRegistry::new();
        assert!(registry.is_empty());
        let first = registry.register(ResourceKey::Cpu);
        let second = registry.register(ResourceKey::Cpu);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }
}
