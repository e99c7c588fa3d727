use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

pub mod histogram;
pub mod inputs;

pub use histogram::{merge, DurationHistogram, DurationSample, ResultSet, VersionResult};
pub use inputs::{CollectInputs, VersionSpec};

/// Error types for load collection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// Malformed or missing task input, detected before anything is invoked.
    #[error("Invalid task input: {0}")]
    Config(String),

    #[error("Load generator failed for version {version}: {message}")]
    Invocation { version: String, message: String },

    #[error("Unreadable load generator output for version {version}: {message}")]
    Parse { version: String, message: String },

    #[error("Timed out after {0:?} waiting for load generation")]
    Timeout(Duration),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl CollectError {
    pub fn invocation(version: &str, message: impl Into<String>) -> Self {
        CollectError::Invocation { version: version.to_string(), message: message.into() }
    }

    pub fn parse(version: &str, message: impl Into<String>) -> Self {
        CollectError::Parse { version: version.to_string(), message: message.into() }
    }
}

/// Result type for load collection
pub type Result<T> = std::result::Result<T, CollectError>;

/// Treat an explicit JSON `null` the same as a missing field.
///
/// Producers that marshal empty slices and maps as `null` are common enough that
/// rejecting them would make previously stored state unreadable.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
