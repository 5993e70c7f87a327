//! Configuration values and the keys the scheduler reads.

use serde::{Deserialize, Serialize};

/// Whether GPU search is enabled at all. Read once at start-up.
pub const GPU_ENABLE: &str = "gpu.enable";

/// Minimum query count for a search to go to a GPU. Reloaded live.
pub const GPU_SEARCH_THRESHOLD: &str = "gpu.gpu_search_threshold";

/// Ordered GPU devices used for search. Read once at start-up.
pub const GPU_SEARCH_DEVICES: &str = "gpu.search_devices";

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Ordered list of strings
    List(Vec<String>),
}

impl ConfigValue {
    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        ConfigValue::List(items)
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}
