//! Selection passes and the pipeline that runs them.

use tracing::{debug, info};
use vecsched_config::{ConfigSnapshot, ConfigStore};
use vecsched_core::TaskDescriptor;

use crate::error::Result;

/// One stage of resource selection.
///
/// A pass either claims a task (assigning it a resource) or declines it so
/// the next pass can try.
pub trait Pass: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Capture start-up configuration.
    fn init(&mut self, snapshot: &ConfigSnapshot) -> Result<()>;

    /// Try to claim the task. `Ok(true)` means it was claimed.
    fn run(&self, task: &mut TaskDescriptor) -> Result<bool>;
}

/// Ordered chain of passes.
#[derive(Default)]
pub struct PassPipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass.
    pub fn with_pass(mut self, pass: Box<dyn Pass>) -> Self {
        self.passes.push(pass);
        self
    }

    /// Append a pass.
    pub fn push(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Initialize every pass from a snapshot.
    pub fn init(&mut self, snapshot: &ConfigSnapshot) -> Result<()> {
        for pass in &mut self.passes {
            pass.init(snapshot)?;
        }
        info!(passes = self.passes.len(), "selection pipeline initialized");
        Ok(())
    }

    /// Read a snapshot from the store and initialize every pass with it.
    pub fn load(&mut self, store: &dyn ConfigStore) -> Result<ConfigSnapshot> {
        let snapshot = ConfigSnapshot::load(store)?;
        self.init(&snapshot)?;
        Ok(snapshot)
    }

    /// Offer the task to each pass in order.
    ///
    /// Returns the name of the pass that claimed it, or `None` if every
    /// pass declined.
    pub fn dispatch(&self, task: &mut TaskDescriptor) -> Result<Option<&str>> {
        for pass in &self.passes {
            if pass.run(task)? {
                return Ok(Some(pass.name()));
            }
        }
        debug!(task = %task.id, kind = %task.kind, index = %task.index_kind, "no pass claimed task");
        Ok(None)
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the pipeline has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
