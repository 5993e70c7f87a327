//! Dynamic configuration for the vecsched scheduler.
//!
//! Configuration lives in an observable key store. Components read the
//! keys they need once at start-up and hold a [`ConfigSubscription`] for
//! the keys they reload live.

#![warn(missing_docs)]

pub mod error;
pub mod value;
pub mod store;
pub mod snapshot;
pub mod document;
pub mod subscription;

pub use error::{ConfigError, Result};
pub use value::{ConfigValue, GPU_ENABLE, GPU_SEARCH_THRESHOLD, GPU_SEARCH_DEVICES};
pub use store::{ConfigStore, ConfigObserver, ObserverId, InMemoryConfigStore};
pub use snapshot::{ConfigSnapshot, parse_devices};
pub use document::{ConfigDocument, GpuConfig, ConfigSource, FileConfigSource};
pub use subscription::ConfigSubscription;
