use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mesh::frame::Frame;

/// Single-slot "latest value" cell for camera frames.
///
/// Written only by a source's acquisition loop, read by the compositing
/// thread. Publishing swaps in a new `Arc<Frame>` under the lock, so a
/// reader holds either the old frame or the new one, never a mix.
pub struct FrameSlot {
    latest: Mutex<Option<Arc<Frame>>>,
    /// Monotonic counter incremented on each publish.
    sequence: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    /// Replace the latest frame.
    pub fn publish(&self, frame: Frame) {
        let frame = Arc::new(frame);
        *self.latest.lock() = Some(frame);
        self.sequence.fetch_add(1, Ordering::Release);
    }

    /// Number of frames published so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// The most recently published frame, if any.
    ///
    /// Returns a reference-counted pointer rather than a pixel copy. Frames
    /// are immutable, so the producer cannot change what the reader sees.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.lock().clone()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
