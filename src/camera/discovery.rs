use crate::camera::backend::CaptureBackend;
use crate::camera::types::{CaptureFormat, DeviceInfo};

/// Try to open every index in `0..max_index` and read one frame.
///
/// Indices that fail to open are skipped. Each opened device is released
/// before the next index is tried.
pub fn probe(
    backend: &dyn CaptureBackend,
    max_index: u32,
    format: &CaptureFormat,
) -> Vec<DeviceInfo> {
    let mut found = Vec::new();
    for index in 0..max_index {
        let mut device = match backend.open(index, format) {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Probe skipped index {index}: {e}");
                continue;
            }
        };
        let responsive = match device.read_frame() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Device {index} opened but did not deliver a frame: {e}");
                false
            }
        };
        drop(device);
        found.push(DeviceInfo {
            index,
            name: format!("{} device {index}", backend.name()),
            responsive,
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummyBackend;

    #[test]
    fn probe_lists_openable_indices() {
        let backend = DummyBackend::new().with_missing(1).with_missing(3);
        let found = probe(&backend, 5, &CaptureFormat::new(4, 4, 30.0));
        let indices: Vec<u32> = found.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 2, 4]);
        assert!(found.iter().all(|d| d.responsive));
    }

    #[test]
    fn probe_flags_devices_that_cannot_read() {
        let backend = DummyBackend::new().with_offline_after(0, 0);
        let found = probe(&backend, 2, &CaptureFormat::new(4, 4, 30.0));
        assert!(!found[0].responsive);
        assert!(found[1].responsive);
    }

    #[test]
    fn probe_releases_every_device() {
        let backend = DummyBackend::new();
        let _ = probe(&backend, 4, &CaptureFormat::new(4, 4, 30.0));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn probe_with_zero_range_finds_nothing() {
        let backend = DummyBackend::new();
        assert!(probe(&backend, 0, &CaptureFormat::default()).is_empty());
    }
}
