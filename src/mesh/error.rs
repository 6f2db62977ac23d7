use thiserror::Error;

use crate::camera::error::CameraError;
use crate::mesh::pipeline::PipelineState;

/// Mesh pipeline errors.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("{operation} is not valid while the pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("unknown camera: {0}")]
    UnknownCamera(String),

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, MeshError>;
