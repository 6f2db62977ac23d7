use std::sync::Arc;
use tracing::{info, warn};

use crate::camera::backend::CaptureBackend;
use crate::camera::error::Result;
use crate::camera::types::{CameraIdentity, CaptureFormat};
use crate::capture::source::{FrameSource, SourceOptions};
use crate::diagnostics::stats::DiagnosticSnapshot;
use crate::mesh::frame::Frame;

/// The fixed, ordered set of frame sources behind one mesh.
///
/// Sources start as a unit: either every camera opens or none stays open.
pub struct CaptureBank {
    backend: Arc<dyn CaptureBackend>,
    format: CaptureFormat,
    options: SourceOptions,
    sources: Vec<FrameSource>,
    blank: Arc<Frame>,
}

impl CaptureBank {
    pub fn new(backend: Arc<dyn CaptureBackend>, format: CaptureFormat) -> Self {
        Self::with_options(backend, format, SourceOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn CaptureBackend>,
        format: CaptureFormat,
        options: SourceOptions,
    ) -> Self {
        Self {
            backend,
            format,
            options,
            sources: Vec::new(),
            blank: Arc::new(Frame::blank(format.width, format.height)),
        }
    }

    /// Open one source per identity, in order.
    ///
    /// Any sources from a previous start are closed first. If a camera fails
    /// to open, every source opened by this call is closed before the
    /// `DeviceUnavailable` error is returned.
    pub fn start(&mut self, identities: &[CameraIdentity]) -> Result<()> {
        self.stop();

        let mut opened: Vec<FrameSource> = Vec::with_capacity(identities.len());
        for identity in identities {
            match FrameSource::open_with(
                Arc::clone(&self.backend),
                identity.clone(),
                self.format,
                self.options,
            ) {
                Ok(source) => opened.push(source),
                Err(e) => {
                    warn!(
                        "Failed to open {identity}, rolling back {} opened source(s): {e}",
                        opened.len()
                    );
                    for mut source in opened {
                        source.close();
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "Capture bank started with {} camera(s) on {} backend",
            opened.len(),
            self.backend.name()
        );
        self.sources = opened;
        Ok(())
    }

    /// The latest frame from every source, in start order.
    ///
    /// A source that has not produced a frame yet contributes a blank frame
    /// of the configured resolution. Frames are not synchronised across
    /// cameras.
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        self.sources
            .iter()
            .map(|source| source.latest().unwrap_or_else(|| Arc::clone(&self.blank)))
            .collect()
    }

    /// Close every source. Idempotent, and a no-op before `start`.
    pub fn stop(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        for mut source in self.sources.drain(..) {
            source.close();
        }
        info!("Capture bank stopped");
    }

    /// Whether every source has produced at least one frame.
    pub fn all_live(&self) -> bool {
        self.sources.iter().all(|source| source.sequence() > 0)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn identities(&self) -> Vec<CameraIdentity> {
        self.sources.iter().map(|s| s.identity().clone()).collect()
    }

    /// Per-camera acquisition stats, in start order.
    pub fn diagnostics(&self) -> Vec<(CameraIdentity, DiagnosticSnapshot)> {
        self.sources
            .iter()
            .map(|s| (s.identity().clone(), s.diagnostics()))
            .collect()
    }
}

impl Drop for CaptureBank {
    fn drop(&mut self) {
        self.stop();
    }
}
