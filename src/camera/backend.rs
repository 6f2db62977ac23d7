use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::error::Result;
use crate::camera::types::CaptureFormat;
use crate::mesh::frame::Frame;

/// Platform-agnostic video capture backend.
///
/// Opens devices by index. Implemented by the synthetic [`DummyBackend`]
/// and, with the `native` feature, by a `nokhwa`-backed backend.
///
/// [`DummyBackend`]: crate::camera::dummy::DummyBackend
pub trait CaptureBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Open a device and configure it for `format`, arming `release` with
    /// the closer for the new handle.
    ///
    /// A missing or busy device fails with `DeviceUnavailable`. The returned
    /// handle is used only on the thread that opened it; `release` may be
    /// fired from any thread, before or after the open completes.
    fn open_with_release(
        &self,
        index: u32,
        format: &CaptureFormat,
        release: &ReleaseHandle,
    ) -> Result<Box<dyn CaptureDevice>>;

    /// Open a device that is only ever released by dropping it.
    fn open(&self, index: u32, format: &CaptureFormat) -> Result<Box<dyn CaptureDevice>> {
        self.open_with_release(index, format, &ReleaseHandle::new())
    }
}

/// One open device handle. Dropping it releases the device.
pub trait CaptureDevice {
    /// Read one frame, blocking for at most the device's read timeout.
    ///
    /// Failures are transient: the caller keeps the previous frame and
    /// tries again on the next cycle.
    fn read_frame(&mut self) -> Result<Frame>;
}

type Closer = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct ReleaseState {
    released: AtomicBool,
    closer: Mutex<Option<Closer>>,
}

/// Closes a device from outside the thread that reads it.
///
/// The backend arms the handle with a closer once the device is open; the
/// closer runs exactly once, on the first [`ReleaseHandle::release`] or
/// immediately on arming if the handle was already released. Devices fire
/// it from `Drop` as well, so dropping after a forced release is a no-op.
#[derive(Clone, Default)]
pub struct ReleaseHandle {
    state: Arc<ReleaseState>,
}

impl ReleaseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the closer for a freshly opened device.
    pub fn arm(&self, closer: impl FnOnce() + Send + 'static) {
        let mut slot = self.state.closer.lock();
        if self.is_released() {
            drop(slot);
            closer();
            return;
        }
        *slot = Some(Box::new(closer));
    }

    /// Close the device now. Idempotent.
    pub fn release(&self) {
        if self.state.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let closer = self.state.closer.lock().take();
        if let Some(closer) = closer {
            closer();
        }
    }

    pub fn is_released(&self) -> bool {
        self.state.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
