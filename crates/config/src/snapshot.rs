//! Point-in-time view of the GPU configuration.

use serde::Serialize;
use vecsched_core::DeviceId;

use crate::document::GpuConfig;
use crate::error::Result;
use crate::store::ConfigStore;
use crate::value::{GPU_ENABLE, GPU_SEARCH_DEVICES, GPU_SEARCH_THRESHOLD};

/// GPU settings as read at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    /// GPU search enabled
    pub gpu_enabled: bool,
    /// Minimum nq for GPU search
    pub gpu_search_threshold: i64,
    /// Ordered search devices
    pub search_devices: Vec<DeviceId>,
}

impl ConfigSnapshot {
    /// Read the GPU keys from a store.
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        Ok(Self {
            gpu_enabled: store.read_bool(GPU_ENABLE)?,
            gpu_search_threshold: store.read_int(GPU_SEARCH_THRESHOLD)?,
            search_devices: parse_devices(&store.read_list(GPU_SEARCH_DEVICES)?)?,
        })
    }

    /// Build a snapshot straight from a config document section.
    pub fn from_config(gpu: &GpuConfig) -> Result<Self> {
        Ok(Self {
            gpu_enabled: gpu.enable,
            gpu_search_threshold: gpu.gpu_search_threshold,
            search_devices: parse_devices(&gpu.search_devices)?,
        })
    }
}

/// Parse an ordered device list such as `["gpu0", "gpu1"]`.
///
/// Order is preserved and duplicates are kept: listing a device twice
/// gives it twice the share of round-robin traffic.
pub fn parse_devices<S: AsRef<str>>(names: &[S]) -> Result<Vec<DeviceId>> {
    names
        .iter()
        .map(|name| name.as_ref().parse::<DeviceId>().map_err(Into::into))
        .collect()
}
