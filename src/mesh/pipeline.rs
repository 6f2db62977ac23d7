use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::camera::backend::CaptureBackend;
use crate::camera::types::{CameraIdentity, CaptureFormat};
use crate::capture::bank::CaptureBank;
use crate::capture::source::SourceOptions;
use crate::diagnostics::stats::DiagnosticSnapshot;
use crate::mesh::composite::Compositor;
use crate::mesh::error::{MeshError, Result};
use crate::mesh::frame::{Canvas, Layer};
use crate::mesh::params::PlacementParams;
use crate::mesh::transform::LayerTransformer;

/// Lifecycle of a [`MeshPipeline`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    Unstarted,
    Running,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Capture, transform and composite for a fixed set of cameras.
///
/// Owned by the presentation layer. `next_frame` and `update_params` take
/// `&self` so a preview loop can keep producing frames while edits arrive;
/// start and stop need exclusive access.
pub struct MeshPipeline {
    bank: CaptureBank,
    transformer: LayerTransformer,
    compositor: Compositor,
    cameras: Vec<CameraIdentity>,
    params: Mutex<Vec<PlacementParams>>,
    state: PipelineState,
}

impl MeshPipeline {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        canvas_width: u32,
        canvas_height: u32,
        format: CaptureFormat,
    ) -> Self {
        Self::with_source_options(
            backend,
            canvas_width,
            canvas_height,
            format,
            SourceOptions::default(),
        )
    }

    pub fn with_source_options(
        backend: Arc<dyn CaptureBackend>,
        canvas_width: u32,
        canvas_height: u32,
        format: CaptureFormat,
        options: SourceOptions,
    ) -> Self {
        Self {
            bank: CaptureBank::with_options(backend, format, options),
            transformer: LayerTransformer::new(canvas_width, canvas_height),
            compositor: Compositor::new(canvas_width, canvas_height),
            cameras: Vec::new(),
            params: Mutex::new(Vec::new()),
            state: PipelineState::Unstarted,
        }
    }

    /// Open every camera and begin acquisition.
    ///
    /// Iteration order is layer order: the first camera is the bottom
    /// layer. Valid only once, from `Unstarted`. If any camera fails to
    /// open, nothing stays open and the pipeline remains `Unstarted`.
    pub fn start<I>(&mut self, config: I) -> Result<()>
    where
        I: IntoIterator<Item = (CameraIdentity, PlacementParams)>,
    {
        if self.state != PipelineState::Unstarted {
            return Err(MeshError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let (cameras, params): (Vec<_>, Vec<_>) = config.into_iter().unzip();
        self.bank.start(&cameras)?;

        info!(
            cameras = cameras.len(),
            canvas = ?self.canvas_size(),
            "Mesh pipeline running"
        );
        self.cameras = cameras;
        *self.params.lock() = params;
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Compose one output frame from the latest frame of every camera.
    ///
    /// Never blocks on camera I/O. Cameras without a frame yet, or that went
    /// offline, contribute their blank or last good frame.
    pub fn next_frame(&self) -> Result<Canvas> {
        if self.state != PipelineState::Running {
            return Err(MeshError::InvalidState {
                operation: "next_frame",
                state: self.state,
            });
        }

        let frames = self.bank.snapshot();
        let params = self.params.lock().clone();
        let layers: Vec<Layer> = frames
            .iter()
            .zip(&params)
            .map(|(frame, p)| self.transformer.transform(frame, p))
            .collect();
        Ok(self.compositor.blend(&layers))
    }

    /// Replace the placement for `identity`; seen by the next `next_frame`.
    pub fn update_params(&self, identity: &CameraIdentity, params: PlacementParams) -> Result<()> {
        let index = self
            .cameras
            .iter()
            .position(|c| c == identity)
            .ok_or_else(|| MeshError::UnknownCamera(identity.to_string()))?;
        self.params.lock()[index] = params;
        debug!(camera = %identity, ?params, "Placement updated");
        Ok(())
    }

    /// Current placement of every camera, in layer order.
    pub fn params(&self) -> Vec<(CameraIdentity, PlacementParams)> {
        self.cameras
            .iter()
            .cloned()
            .zip(self.params.lock().iter().copied())
            .collect()
    }

    /// Stop acquisition and release every device. Valid from any state;
    /// repeated calls are no-ops.
    pub fn stop(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.bank.stop();
        self.state = PipelineState::Stopped;
        info!("Mesh pipeline stopped");
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.transformer.canvas_size()
    }

    pub fn cameras(&self) -> &[CameraIdentity] {
        &self.cameras
    }

    /// Whether every camera has delivered at least one real frame.
    pub fn is_live(&self) -> bool {
        self.state == PipelineState::Running && self.bank.all_live()
    }

    pub fn diagnostics(&self) -> Vec<(CameraIdentity, DiagnosticSnapshot)> {
        self.bank.diagnostics()
    }
}

impl Drop for MeshPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
