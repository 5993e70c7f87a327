//! Execution layer - resource selection passes for scheduled tasks.

#![warn(missing_docs)]

pub mod error;
pub mod limits;
pub mod cursor;
pub mod policy;
pub mod pass;

pub use error::{SelectError, Result};
pub use limits::GpuLimits;
pub use cursor::{RoundRobinCursor, advance};
pub use policy::{SelectionPolicy, Decision, RouteReason, NprobeCheck};
pub use pass::{Pass, PassPipeline};
