//! Resource registry for the vecsched scheduler.
//!
//! The registry resolves a [`ResourceKey`](vecsched_core::ResourceKey) to
//! the handle the executor runs tasks on.

#![warn(missing_docs)]

pub mod registry;

pub use registry::{ResourceRegistry, RegistryError, InMemoryRegistry};
