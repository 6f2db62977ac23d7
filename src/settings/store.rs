use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::types::{device_index_from_name, CameraSettings, MeshConfig, ParamUpdate};

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown camera: {0}")]
    UnknownCamera(String),
}

impl SettingsError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// The mesh config file plus an in-memory working copy.
///
/// Edits only touch memory; call [`SettingsStore::save`] to persist.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<MeshConfig>,
}

impl SettingsStore {
    /// Open the store at `path`, loading the file if it exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = Self::load(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Load a config file, returning an empty config when it is missing.
    pub fn load(path: &Path) -> Result<MeshConfig> {
        if !path.exists() {
            info!("No config at {}, starting empty", path.display());
            return Ok(MeshConfig::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| SettingsError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| SettingsError::io(&self.path, e))?;

        info!(cameras = data.len(), "Config saved to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the whole config.
    pub fn config(&self) -> MeshConfig {
        self.data.lock().clone()
    }

    pub fn get_camera(&self, name: &str) -> Option<CameraSettings> {
        self.data.lock().get(name).cloned()
    }

    /// Camera names in compositing order.
    pub fn camera_ids(&self) -> Vec<String> {
        self.data.lock().names().map(str::to_string).collect()
    }

    /// Add a camera with default placement on top of the stack. Returns
    /// `false` if the name is already taken.
    pub fn add_camera(&self, name: &str, device_id: u32) -> bool {
        let mut data = self.data.lock();
        if data.contains(name) {
            return false;
        }
        data.insert(name, CameraSettings::new(device_id));
        debug!(camera = name, device_id, "Camera added");
        true
    }

    /// Edit one field of a camera.
    ///
    /// A missing camera is created first when its name implies a device
    /// index (`camera_<N>`); otherwise the edit is rejected.
    pub fn update_param(&self, name: &str, update: ParamUpdate) -> Result<()> {
        let mut data = self.data.lock();
        if !data.contains(name) {
            let device_id = device_index_from_name(name)
                .ok_or_else(|| SettingsError::UnknownCamera(name.to_string()))?;
            data.insert(name, CameraSettings::new(device_id));
        }
        if let Some(camera) = data.get_mut(name) {
            camera.apply(update);
        }
        debug!(camera = name, ?update, "Camera parameter updated");
        Ok(())
    }

    /// Replace all settings for a camera, keeping its position if present.
    pub fn set_camera(&self, name: &str, settings: CameraSettings) {
        self.data.lock().insert(name, settings);
    }

    /// Remove a camera. Returns whether it existed.
    pub fn remove_camera(&self, name: &str) -> bool {
        self.data.lock().remove(name).is_some()
    }
}
