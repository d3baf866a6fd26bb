//! Error taxonomy for the provider and probe interfaces.

use thiserror::Error;
use warden_id::{CommandId, InstanceId};

/// Errors surfaced by a [`crate::FleetProvider`] implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be reached or refused the call
    /// (network, auth, throttling). Callers skip the affected instance for
    /// the current cycle and retry naturally on the next one.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The referenced instance does not exist at the provider.
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// No image name matched the versioned naming pattern.
    ///
    /// Raised only during instance creation; fatal to that launch call.
    #[error("no image matching pattern '{pattern}'")]
    ImageNotFound { pattern: String },

    /// The configured image naming pattern is not a valid regex.
    #[error("invalid image pattern: {0}")]
    InvalidImagePattern(#[from] regex::Error),
}

/// Errors surfaced by a [`crate::RemoteProbe`] implementation.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The instance cannot accept remote commands right now.
    #[error("instance unreachable for command dispatch: {0}")]
    Unreachable(InstanceId),

    /// The command handle is unknown to the probe backend.
    #[error("unknown command handle: {0}")]
    UnknownCommand(CommandId),
}
