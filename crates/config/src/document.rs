//! Config documents and the sources they are loaded from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Top-level config document.
///
/// ```json
/// {"gpu": {"enable": true, "gpu_search_threshold": 1000, "search_devices": ["gpu0"]}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// GPU section
    #[serde(default)]
    pub gpu: GpuConfig,
}

impl ConfigDocument {
    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// GPU section of the config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuConfig {
    /// Enable GPU search
    #[serde(default)]
    pub enable: bool,

    /// Searches with fewer queries than this stay on CPU
    #[serde(default = "default_threshold")]
    pub gpu_search_threshold: i64,

    /// Devices used for search, in round-robin order
    #[serde(default = "default_devices")]
    pub search_devices: Vec<String>,
}

fn default_threshold() -> i64 {
    1000
}

fn default_devices() -> Vec<String> {
    vec!["gpu0".to_string()]
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enable: false,
            gpu_search_threshold: default_threshold(),
            search_devices: default_devices(),
        }
    }
}

/// Where config documents come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the current document.
    async fn load(&self) -> Result<ConfigDocument>;
}

/// JSON config file on disk.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Create a source for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<ConfigDocument> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let document = ConfigDocument::from_json(&contents)?;
        debug!(path = %self.path.display(), "loaded config document");
        Ok(document)
    }
}
