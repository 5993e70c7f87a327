//! Selection errors.

use vecsched_config::ConfigError;
use vecsched_core::IndexKind;
use vecsched_resource::RegistryError;

/// Error type for selection passes.
pub type Result<T> = std::result::Result<T, SelectError>;

/// Fatal errors raised while initializing or running a pass.
///
/// Declining a task or failing to parse its search params are not errors.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// GPU search is on but there is nowhere to send it
    #[error("GPU search enabled for {index_kind} but no search devices are configured")]
    MisconfiguredDeviceSet {
        /// Index kind the pass governs
        index_kind: IndexKind,
    },

    /// The registry does not know the selected resource
    #[error(transparent)]
    ResourceNotFound(#[from] RegistryError),

    /// Configuration could not be read
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
