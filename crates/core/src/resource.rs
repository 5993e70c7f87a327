//! Compute resources a task can be routed to.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ordinal of a GPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error parsing a device name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid GPU device '{0}', expected 'gpuN' or 'N'")]
pub struct ParseDeviceError(pub String);

impl FromStr for DeviceId {
    type Err = ParseDeviceError;

    /// Accepts `gpu0`, `GPU3` or a bare ordinal such as `2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("gpu") => &trimmed[3..],
            _ => trimmed,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseDeviceError(s.to_string()));
        }
        digits
            .parse::<u32>()
            .map(DeviceId)
            .map_err(|_| ParseDeviceError(s.to_string()))
    }
}

/// Address of a resource in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    /// The CPU pool
    Cpu,
    /// One specific GPU
    Gpu(DeviceId),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Cpu => write!(f, "cpu"),
            ResourceKey::Gpu(id) => write!(f, "gpu{}", id),
        }
    }
}

/// Handle to a registered resource.
///
/// Cheap to clone; two handles are equal when they address the same resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    key: ResourceKey,
    name: Arc<str>,
}

impl ResourceHandle {
    /// Create a handle for the given key.
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            name: Arc::from(key.to_string()),
        }
    }

    /// The registry key.
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Resource name, `cpu` or `gpuN`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the CPU resource.
    pub fn is_cpu(&self) -> bool {
        self.key == ResourceKey::Cpu
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
