//! Configuration errors.

/// Error type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while reading or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Key has never been set
    #[error("config key not set: {0}")]
    MissingKey(String),

    /// Key holds a value of another type
    #[error("config key {key} is not a {expected}")]
    TypeMismatch {
        /// Key that was read
        key: String,
        /// Type the caller asked for
        expected: &'static str,
    },

    /// Device list entry could not be parsed
    #[error(transparent)]
    InvalidDevice(#[from] vecsched_core::ParseDeviceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
