use std::fmt;

use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The device could not be opened at all. Fatal to startup.
    #[error("camera {identity} unavailable: {reason}")]
    DeviceUnavailable { identity: String, reason: String },

    /// A single frame read failed on an open device. Recovered locally.
    #[error("frame read failed: {0}")]
    Read(String),

    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(String),
}

impl CameraError {
    /// Build a `DeviceUnavailable` for the given camera.
    pub fn unavailable(identity: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }

    /// Re-label an open failure with the camera it belongs to.
    ///
    /// Backends only know the device index; the acquisition layer knows the
    /// logical camera name.
    pub fn for_camera(self, identity: impl fmt::Display) -> Self {
        match self {
            Self::DeviceUnavailable { reason, .. } => Self::unavailable(identity, reason),
            other => Self::unavailable(identity, other.to_string()),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
