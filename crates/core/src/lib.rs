//! vecsched core data models.
//!
//! This crate defines the task and resource types shared by the
//! configuration, registry and selection layers of the search scheduler.

#![warn(missing_docs)]

// Core identities
mod id;

// Scheduled work
mod task;

// Compute resources
mod resource;

// Re-exports
pub use id::*;

pub use task::{TaskDescriptor, TaskKind, IndexKind, ExtraParams};
pub use resource::{DeviceId, ParseDeviceError, ResourceKey, ResourceHandle};
