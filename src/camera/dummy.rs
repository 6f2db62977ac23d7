use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::backend::{CaptureBackend, CaptureDevice, ReleaseHandle};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::CaptureFormat;
use crate::mesh::frame::Frame;

/// Fill colours handed out by device index, cycling.
const PALETTE: &[[u8; 3]] = &[
    [220, 40, 40],
    [40, 180, 60],
    [40, 80, 220],
    [230, 200, 40],
    [200, 60, 200],
    [40, 200, 200],
    [240, 140, 30],
    [180, 180, 180],
];

/// A fake capture backend for running without real hardware.
///
/// Every device index produces a solid frame in its palette colour. Faults
/// are injected with the builder methods. Open device handles are counted
/// so tests can check that shutdown and rollback release everything.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct DummyBackend {
    missing: HashSet<u32>,
    fail_every: Option<u64>,
    offline_after: HashMap<u32, u64>,
    read_delay: Option<Duration>,
    open_delay: Option<Duration>,
    open_handles: Arc<AtomicUsize>,
}

impl DummyBackend {
    /// Create a backend where every index opens and reads succeed.
    pub fn new() -> Self {
        Self {
            missing: HashSet::new(),
            fail_every: None,
            offline_after: HashMap::new(),
            read_delay: None,
            open_delay: None,
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Make `index` fail to open.
    pub fn with_missing(mut self, index: u32) -> Self {
        self.missing.insert(index);
        self
    }

    /// Fail every `n`th read on every device.
    pub fn with_read_failures_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// After `reads` successful reads, every further read on `index` fails.
    pub fn with_offline_after(mut self, index: u32, reads: u64) -> Self {
        self.offline_after.insert(index, reads);
        self
    }

    /// Block each read for `delay`, simulating a slow or hung device.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Block each open for `delay`, simulating a device that is slow to
    /// come up. An open released while waiting gives up without a handle.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Number of device handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }

    /// The solid colour produced by device `index`.
    pub fn color_for(index: u32) -> [u8; 3] {
        PALETTE[index as usize % PALETTE.len()]
    }

    /// A frame as device `index` would produce it.
    pub fn test_frame(index: u32, width: u32, height: u32) -> Frame {
        let color = Self::color_for(index);
        Frame::from_fn(width, height, |_, _| color)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn open_with_release(
        &self,
        index: u32,
        format: &CaptureFormat,
        release: &ReleaseHandle,
    ) -> Result<Box<dyn CaptureDevice>> {
        if self.missing.contains(&index) {
            return Err(CameraError::unavailable(
                format!("device {index}"),
                "no such device",
            ));
        }
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
            if release.is_released() {
                return Err(CameraError::unavailable(
                    format!("device {index}"),
                    "open abandoned",
                ));
            }
        }

        self.open_handles.fetch_add(1, Ordering::AcqRel);
        let open_handles = Arc::clone(&self.open_handles);
        release.arm(move || {
            open_handles.fetch_sub(1, Ordering::AcqRel);
        });
        Ok(Box::new(DummyDevice {
            index,
            format: *format,
            reads: 0,
            fail_every: self.fail_every,
            offline_after: self.offline_after.get(&index).copied(),
            read_delay: self.read_delay,
            release: release.clone(),
        }))
    }
}

struct DummyDevice {
    index: u32,
    format: CaptureFormat,
    reads: u64,
    fail_every: Option<u64>,
    offline_after: Option<u64>,
    read_delay: Option<Duration>,
    release: ReleaseHandle,
}

impl DummyDevice {
    fn check_open(&self) -> Result<()> {
        if self.release.is_released() {
            return Err(CameraError::Read("device was released".to_string()));
        }
        Ok(())
    }
}

impl CaptureDevice for DummyDevice {
    fn read_frame(&mut self) -> Result<Frame> {
        self.check_open()?;
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
            self.check_open()?;
        }
        self.reads += 1;
        if self.offline_after.is_some_and(|limit| self.reads > limit) {
            return Err(CameraError::Read("device went offline".to_string()));
        }
        if self.fail_every.is_some_and(|n| self.reads % n == 0) {
            return Err(CameraError::Read("simulated read timeout".to_string()));
        }
        Ok(DummyBackend::test_frame(
            self.index,
            self.format.width,
            self.format.height,
        ))
    }
}

impl Drop for DummyDevice {
    fn drop(&mut self) {
        self.release.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> CaptureFormat {
        CaptureFormat::new(8, 6, 30.0)
    }

    #[test]
    fn dummy_backend_opens_any_index_by_default() {
        let backend = DummyBackend::new();
        assert!(backend.open(0, &format()).is_ok());
        assert!(backend.open(42, &format()).is_ok());
    }

    #[test]
    fn dummy_backend_frames_match_requested_format() {
        let backend = DummyBackend::new();
        let mut device = backend.open(1, &format()).unwrap();
        let frame = device.read_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert_eq!(frame.pixel(3, 3), DummyBackend::color_for(1));
    }

    #[test]
    fn dummy_backend_missing_index_is_unavailable() {
        let backend = DummyBackend::new().with_missing(3);
        let result = backend.open(3, &format());
        assert!(matches!(result, Err(CameraError::DeviceUnavailable { .. })));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn dummy_backend_counts_open_handles() {
        let backend = DummyBackend::new();
        let a = backend.open(0, &format()).unwrap();
        let b = backend.open(1, &format()).unwrap();
        assert_eq!(backend.open_handles(), 2);
        drop(a);
        assert_eq!(backend.open_handles(), 1);
        drop(b);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn forced_release_then_drop_counts_once() {
        let backend = DummyBackend::new();
        let release = ReleaseHandle::new();
        let mut device = backend.open_with_release(0, &format(), &release).unwrap();
        let _other = backend.open(1, &format()).unwrap();
        assert_eq!(backend.open_handles(), 2);

        release.release();
        assert_eq!(backend.open_handles(), 1);
        assert!(matches!(device.read_frame(), Err(CameraError::Read(_))));
        drop(device);
        assert_eq!(backend.open_handles(), 1);
    }

    #[test]
    fn drop_then_release_counts_once() {
        let backend = DummyBackend::new();
        let release = ReleaseHandle::new();
        let device = backend.open_with_release(0, &format(), &release).unwrap();
        drop(device);
        assert_eq!(backend.open_handles(), 0);
        release.release();
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn release_during_slow_open_leaves_no_handle() {
        let backend = DummyBackend::new().with_open_delay(Duration::from_millis(50));
        let release = ReleaseHandle::new();
        release.release();
        let result = backend.open_with_release(0, &format(), &release);
        assert!(matches!(result, Err(CameraError::DeviceUnavailable { .. })));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn release_while_reading_frees_handle_immediately() {
        let backend = Arc::new(DummyBackend::new().with_read_delay(Duration::from_millis(200)));
        let release = ReleaseHandle::new();
        let reader = {
            let backend = Arc::clone(&backend);
            let release = release.clone();
            std::thread::spawn(move || {
                let mut device = backend.open_with_release(0, &format(), &release).unwrap();
                device.read_frame()
            })
        };
        while backend.open_handles() == 0 {
            std::thread::yield_now();
        }

        release.release();
        assert_eq!(backend.open_handles(), 0);
        assert!(reader.join().unwrap().is_err());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn dummy_backend_injects_periodic_read_failures() {
        let backend = DummyBackend::new().with_read_failures_every(3);
        let mut device = backend.open(0, &format()).unwrap();
        let results: Vec<bool> = (0..6).map(|_| device.read_frame().is_ok()).collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn dummy_backend_goes_offline_after_limit() {
        let backend = DummyBackend::new().with_offline_after(2, 2);
        let mut device = backend.open(2, &format()).unwrap();
        assert!(device.read_frame().is_ok());
        assert!(device.read_frame().is_ok());
        assert!(matches!(device.read_frame(), Err(CameraError::Read(_))));
        assert!(matches!(device.read_frame(), Err(CameraError::Read(_))));
    }

    #[test]
    fn dummy_backend_offline_only_affects_its_index() {
        let backend = DummyBackend::new().with_offline_after(2, 0);
        let mut device = backend.open(1, &format()).unwrap();
        assert!(device.read_frame().is_ok());
    }

    #[test]
    fn palette_cycles_by_index() {
        assert_eq!(
            DummyBackend::color_for(0),
            DummyBackend::color_for(PALETTE.len() as u32)
        );
        assert_ne!(DummyBackend::color_for(0), DummyBackend::color_for(1));
    }

    #[test]
    fn dummy_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DummyBackend>();
    }
}
