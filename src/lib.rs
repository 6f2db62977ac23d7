pub mod camera;
pub mod capture;
pub mod diagnostics;
pub mod mesh;
pub mod preview;
pub mod settings;

use std::sync::Arc;

use camera::backend::CaptureBackend;
use camera::dummy::DummyBackend;

pub use camera::error::CameraError;
pub use camera::types::{CameraIdentity, CaptureFormat};
pub use capture::bank::CaptureBank;
pub use capture::source::{FrameSource, SourceOptions};
pub use mesh::composite::Compositor;
pub use mesh::error::MeshError;
pub use mesh::frame::{Canvas, Frame, Layer};
pub use mesh::params::PlacementParams;
pub use mesh::pipeline::{MeshPipeline, PipelineState};
pub use mesh::transform::LayerTransformer;

/// Which capture backend to drive the mesh with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Native cameras when built with the `native` feature, unless
    /// `DUMMY_CAMERA=1` is set.
    #[default]
    Auto,
    Dummy,
    Native,
}

/// Create the camera backend for the requested kind.
///
/// When `DUMMY_CAMERA=1` is set, `Auto` uses the simulated camera.
pub fn create_backend(kind: BackendKind) -> Result<Arc<dyn CaptureBackend>, CameraError> {
    match kind {
        BackendKind::Dummy => Ok(Arc::new(DummyBackend::new())),
        BackendKind::Auto if DummyBackend::is_enabled() => Ok(Arc::new(DummyBackend::new())),
        BackendKind::Auto | BackendKind::Native => native_backend(kind),
    }
}

#[cfg(feature = "native")]
fn native_backend(_kind: BackendKind) -> Result<Arc<dyn CaptureBackend>, CameraError> {
    Ok(Arc::new(camera::native::NativeBackend::new()))
}

/// Without native support `Auto` falls back to the simulated camera.
#[cfg(not(feature = "native"))]
fn native_backend(kind: BackendKind) -> Result<Arc<dyn CaptureBackend>, CameraError> {
    match kind {
        BackendKind::Native => Err(CameraError::unavailable(
            "native backend",
            "built without the `native` feature",
        )),
        _ => {
            tracing::warn!("No native camera support in this build; using dummy cameras");
            Ok(Arc::new(DummyBackend::new()))
        }
    }
}
