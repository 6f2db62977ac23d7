use serde::Serialize;
use std::fmt;
use std::time::Duration;

const DEFAULT_FPS: f32 = 30.0;

/// Logical camera name plus the physical device index it is bound to.
///
/// Immutable once created; equality covers both parts, so re-binding a
/// name to another device yields a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraIdentity {
    name: String,
    device_index: u32,
}

impl CameraIdentity {
    pub fn new(name: impl Into<String>, device_index: u32) -> Self {
        Self {
            name: name.into(),
            device_index,
        }
    }

    /// Logical name, e.g. `camera_0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform device index the camera is opened by.
    pub fn device_index(&self) -> u32 {
        self.device_index
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (device {})", self.name, self.device_index)
    }
}

/// Requested capture resolution and rate for a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl CaptureFormat {
    pub fn new(width: u32, height: u32, fps: f32) -> Self {
        Self { width, height, fps }
    }

    /// Pacing interval for the acquisition loop. Non-positive or
    /// non-finite rates fall back to 30 fps.
    pub fn frame_interval(&self) -> Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            DEFAULT_FPS
        };
        Duration::from_secs_f64(1.0 / f64::from(fps))
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self::new(640, 480, DEFAULT_FPS)
    }
}

/// A device index found while probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
    /// Whether a test frame could be read after opening.
    pub responsive: bool,
}
