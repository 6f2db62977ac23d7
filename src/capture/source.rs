use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::camera::backend::{CaptureBackend, CaptureDevice, ReleaseHandle};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraIdentity, CaptureFormat};
use crate::capture::slot::FrameSlot;
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};
use crate::mesh::frame::Frame;

/// Log every Nth consecutive read failure at `warn`; the rest go to `debug`.
const FAILURE_WARN_EVERY: u64 = 30;

/// Timeouts governing a source's open and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    /// How long `open` waits for the device to come up.
    pub open_timeout: Duration,
    /// How long `close` waits for the acquisition thread before forcing the
    /// device closed and detaching the thread.
    pub stop_timeout: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects once the thread has exited and dropped its device.
    done: Receiver<()>,
}

/// One camera, continuously acquired on a dedicated thread.
///
/// The thread owns the device handle; consumers only ever see the latest
/// published frame through [`FrameSource::latest`], which never blocks on
/// camera I/O. The source keeps a [`ReleaseHandle`] so it can close the
/// device even while the thread is stuck in a read.
pub struct FrameSource {
    identity: CameraIdentity,
    slot: Arc<FrameSlot>,
    release: ReleaseHandle,
    stop: Arc<AtomicBool>,
    stats: Arc<Mutex<DiagnosticStats>>,
    worker: Option<Worker>,
    stop_timeout: Duration,
}

impl FrameSource {
    /// Open the device for `identity` and start acquiring.
    pub fn open(
        backend: Arc<dyn CaptureBackend>,
        identity: CameraIdentity,
        format: CaptureFormat,
    ) -> Result<Self> {
        Self::open_with(backend, identity, format, SourceOptions::default())
    }

    /// Like [`FrameSource::open`] with explicit timeouts.
    ///
    /// The device is opened on the acquisition thread; this call waits for
    /// the outcome and fails with `DeviceUnavailable` if the open fails or
    /// does not finish within `open_timeout`. A timed-out open is released,
    /// so a device that comes up late is closed at once.
    pub fn open_with(
        backend: Arc<dyn CaptureBackend>,
        identity: CameraIdentity,
        format: CaptureFormat,
        options: SourceOptions,
    ) -> Result<Self> {
        let slot = Arc::new(FrameSlot::new());
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(DiagnosticStats::new()));
        let release = ReleaseHandle::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = {
            let thread_identity = identity.clone();
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            let stats = Arc::clone(&stats);
            let release = release.clone();

            std::thread::Builder::new()
                .name(format!("capture-{}", identity.name()))
                .spawn(move || {
                    let _done = done_tx;
                    let identity = thread_identity;
                    let index = identity.device_index();
                    let device = match backend.open_with_release(index, &format, &release) {
                        Ok(device) => device,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    run_acquisition(&identity, device, &format, &slot, &stop, &stats);
                })
                .map_err(|e| CameraError::Spawn(e.to_string()).for_camera(&identity))?
        };

        match ready_rx.recv_timeout(options.open_timeout) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e.for_camera(&identity));
            }
            Err(RecvTimeoutError::Timeout) => {
                stop.store(true, Ordering::Release);
                release.release();
                return Err(CameraError::unavailable(
                    &identity,
                    format!("open timed out after {:?}", options.open_timeout),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                return Err(CameraError::unavailable(
                    &identity,
                    "acquisition thread exited during open",
                ));
            }
        }

        info!(camera = %identity, "Frame source opened");
        Ok(Self {
            identity,
            slot,
            release,
            stop,
            stats,
            worker: Some(Worker {
                handle,
                done: done_rx,
            }),
            stop_timeout: options.stop_timeout,
        })
    }

    pub fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    /// The most recent frame, or `None` before the first successful read.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Number of frames acquired so far.
    pub fn sequence(&self) -> u64 {
        self.slot.sequence()
    }

    /// Whether the acquisition thread is still owned by this source.
    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    /// Take a snapshot of acquisition stats for this source.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    /// Stop acquiring and release the device. Idempotent.
    ///
    /// Waits at most `stop_timeout` for the thread. If it is stuck inside a
    /// device read, the device is released from here and the thread is
    /// detached; either way no handle is open when this returns.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.handle.thread().unpark();
        match worker.done.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                info!(camera = %self.identity, "Frame source closed");
            }
            Err(RecvTimeoutError::Timeout) => {
                self.release.release();
                warn!(
                    camera = %self.identity,
                    "Thread did not stop within {:?}; device released, thread detached",
                    self.stop_timeout
                );
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Acquisition loop: read, publish on success, keep the old frame on
/// failure, then sleep out the remainder of the frame interval.
fn run_acquisition(
    identity: &CameraIdentity,
    mut device: Box<dyn CaptureDevice>,
    format: &CaptureFormat,
    slot: &FrameSlot,
    stop: &AtomicBool,
    stats: &Mutex<DiagnosticStats>,
) {
    info!(camera = %identity, "Acquisition started");
    let interval = format.frame_interval();

    while !stop.load(Ordering::Acquire) {
        let started = Instant::now();
        match device.read_frame() {
            Ok(frame) if frame.width() == format.width && frame.height() == format.height => {
                slot.publish(frame);
                stats.lock().record_frame();
            }
            Ok(frame) => {
                let streak = stats.lock().record_failure();
                warn!(
                    camera = %identity,
                    streak,
                    "Discarding {}x{} frame, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    format.width,
                    format.height
                );
            }
            Err(e) => {
                let streak = stats.lock().record_failure();
                if streak == 1 || streak % FAILURE_WARN_EVERY == 0 {
                    warn!(camera = %identity, streak, "Frame read failed: {e}");
                } else {
                    debug!(camera = %identity, streak, "Frame read failed: {e}");
                }
            }
        }

        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            if !stop.load(Ordering::Acquire) {
                std::thread::park_timeout(remaining);
            }
        }
    }

    drop(device);
    info!(camera = %identity, "Acquisition stopped, device released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummyBackend;

    fn format() -> CaptureFormat {
        CaptureFormat::new(16, 12, 200.0)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn open_fails_for_missing_device() {
        let backend = Arc::new(DummyBackend::new().with_missing(5));
        let result = FrameSource::open(backend.clone(), CameraIdentity::new("cam", 5), format());
        match result {
            Err(CameraError::DeviceUnavailable { identity, .. }) => {
                assert_eq!(identity, "cam (device 5)");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("open should fail"),
        }
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn source_publishes_frames() {
        let backend = Arc::new(DummyBackend::new());
        let source = FrameSource::open(backend, CameraIdentity::new("cam", 2), format()).unwrap();
        assert!(wait_for(|| source.latest().is_some()));

        let frame = source.latest().unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 12));
        assert_eq!(frame.pixel(0, 0), DummyBackend::color_for(2));
        assert!(source.is_open());
    }

    #[test]
    fn close_is_idempotent_and_releases_device() {
        let backend = Arc::new(DummyBackend::new());
        let mut source =
            FrameSource::open(backend.clone(), CameraIdentity::new("cam", 0), format()).unwrap();
        assert_eq!(backend.open_handles(), 1);

        source.close();
        source.close(); // Should not panic
        assert!(!source.is_open());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn drop_releases_device() {
        let backend = Arc::new(DummyBackend::new());
        let source =
            FrameSource::open(backend.clone(), CameraIdentity::new("cam", 0), format()).unwrap();
        drop(source);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn read_failures_keep_previous_frame() {
        let backend = Arc::new(DummyBackend::new().with_offline_after(1, 2));
        let source = FrameSource::open(backend, CameraIdentity::new("cam", 1), format()).unwrap();

        assert!(wait_for(|| source.diagnostics().failure_count >= 3));
        let frame = source.latest().expect("frame from before going offline");
        assert_eq!(frame.pixel(0, 0), DummyBackend::color_for(1));
        assert_eq!(source.sequence(), 2);
    }

    #[test]
    fn transient_failures_do_not_stop_acquisition() {
        let backend = Arc::new(DummyBackend::new().with_read_failures_every(2));
        let source = FrameSource::open(backend, CameraIdentity::new("cam", 0), format()).unwrap();

        assert!(wait_for(|| source.diagnostics().frame_count >= 5));
        let snap = source.diagnostics();
        assert!(snap.failure_count >= 4);
        assert!(snap.frame_count >= 5);
    }

    #[test]
    fn close_is_bounded_when_device_hangs() {
        let backend = Arc::new(DummyBackend::new().with_read_delay(Duration::from_secs(3)));
        let options = SourceOptions {
            open_timeout: Duration::from_secs(1),
            stop_timeout: Duration::from_millis(50),
        };
        let mut source = FrameSource::open_with(
            backend.clone(),
            CameraIdentity::new("cam", 0),
            format(),
            options,
        )
        .unwrap();
        assert_eq!(backend.open_handles(), 1);

        let started = Instant::now();
        source.close();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!source.is_open());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn open_timeout_leaves_no_handle_behind() {
        let backend = Arc::new(DummyBackend::new().with_open_delay(Duration::from_millis(200)));
        let options = SourceOptions {
            open_timeout: Duration::from_millis(20),
            stop_timeout: Duration::from_millis(50),
        };
        let identity = CameraIdentity::new("cam", 0);
        let result = FrameSource::open_with(backend.clone(), identity, format(), options);
        assert!(matches!(result, Err(CameraError::DeviceUnavailable { .. })));
        assert_eq!(backend.open_handles(), 0);

        // The abandoned open finishes later without ever holding the device.
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn frame_source_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameSource>();
    }
}
