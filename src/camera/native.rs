//! Real camera capture via the `nokhwa` crate.
//!
//! Devices are opened on the acquisition thread and never leave it, so
//! the platform handle does not need to be `Send`. For the same reason a
//! forced release cannot close the stream from another thread: it marks
//! the device released, and the stream is stopped as soon as the
//! acquisition thread next touches it.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use crate::camera::backend::{CaptureBackend, CaptureDevice, ReleaseHandle};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::CaptureFormat;
use crate::mesh::frame::Frame;

/// Capture backend for the platform's native camera API.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn open_with_release(
        &self,
        index: u32,
        format: &CaptureFormat,
        release: &ReleaseHandle,
    ) -> Result<Box<dyn CaptureDevice>> {
        let label = format!("device {index}");
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(format.width, format.height),
                FrameFormat::MJPEG,
                format.fps.round().max(1.0) as u32,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| CameraError::unavailable(&label, e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::unavailable(&label, e.to_string()))?;

        let resolution = camera.resolution();
        tracing::info!(
            "Opened {} at {}x{} (requested {}x{})",
            camera.info().human_name(),
            resolution.width(),
            resolution.height(),
            format.width,
            format.height
        );

        let mut device = NativeDevice {
            camera: Some(camera),
            format: *format,
            release: release.clone(),
        };
        if release.is_released() {
            device.stop_stream();
            return Err(CameraError::unavailable(&label, "open abandoned"));
        }
        Ok(Box::new(device))
    }
}

struct NativeDevice {
    camera: Option<Camera>,
    format: CaptureFormat,
    release: ReleaseHandle,
}

impl NativeDevice {
    fn stop_stream(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Failed to stop camera stream: {e}");
            }
        }
    }
}

impl CaptureDevice for NativeDevice {
    fn read_frame(&mut self) -> Result<Frame> {
        if self.release.is_released() {
            self.stop_stream();
        }
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::Read("device was released".to_string()))?;
        let buffer = camera
            .frame()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let (width, height) = image.dimensions();
        let frame = Frame::from_raw(width, height, image.into_raw())
            .ok_or_else(|| CameraError::Read("decoded buffer has wrong length".to_string()))?;

        // Devices may ignore the requested resolution.
        frame
            .resized(self.format.width, self.format.height)
            .map_err(|e| CameraError::Read(e.to_string()))
    }
}

impl Drop for NativeDevice {
    fn drop(&mut self) {
        self.stop_stream();
        self.release.release();
    }
}
