// Mesh domain — frames, placement, transform, compositing, pipeline.

pub mod composite;
pub mod error;
pub mod frame;
pub mod params;
pub mod pipeline;
pub mod transform;
