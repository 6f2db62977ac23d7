use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::camera::types::CameraIdentity;
use crate::mesh::params::PlacementParams;

fn default_opacity() -> f64 {
    1.0
}

/// Persisted placement for a single camera.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraSettings {
    pub device_id: u32,
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl CameraSettings {
    /// Default placement bound to `device_id`.
    pub fn new(device_id: u32) -> Self {
        Self::with_placement(device_id, PlacementParams::default())
    }

    pub fn with_placement(device_id: u32, params: PlacementParams) -> Self {
        Self {
            device_id,
            x_offset: params.x_offset,
            y_offset: params.y_offset,
            rotation_deg: params.rotation_deg,
            opacity: params.opacity,
        }
    }

    pub fn placement(&self) -> PlacementParams {
        PlacementParams::new(self.x_offset, self.y_offset, self.rotation_deg, self.opacity)
    }

    pub fn identity(&self, name: &str) -> CameraIdentity {
        CameraIdentity::new(name, self.device_id)
    }

    pub fn apply(&mut self, update: ParamUpdate) {
        match update {
            ParamUpdate::DeviceId(v) => self.device_id = v,
            ParamUpdate::XOffset(v) => self.x_offset = v,
            ParamUpdate::YOffset(v) => self.y_offset = v,
            ParamUpdate::RotationDeg(v) => self.rotation_deg = v,
            ParamUpdate::Opacity(v) => self.opacity = v,
        }
    }
}

/// A single-field edit to a camera's settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamUpdate {
    DeviceId(u32),
    XOffset(i32),
    YOffset(i32),
    RotationDeg(f64),
    Opacity(f64),
}

/// Device index implied by a conventional `camera_<N>` name.
pub fn device_index_from_name(name: &str) -> Option<u32> {
    name.strip_prefix("camera_")?.parse().ok()
}

/// Camera name → settings, in compositing order.
///
/// The JSON object's key order is the layer order (first entry is the
/// bottom layer), so it is kept exactly as read and new cameras are
/// appended on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshConfig {
    cameras: Vec<(String, CameraSettings)>,
}

impl MeshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CameraSettings> {
        self.cameras.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CameraSettings> {
        self.cameras
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace. A replaced camera keeps its position; a new one
    /// goes on top. Returns the previous settings, if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        settings: CameraSettings,
    ) -> Option<CameraSettings> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => Some(std::mem::replace(existing, settings)),
            None => {
                self.cameras.push((name, settings));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<CameraSettings> {
        let index = self.cameras.iter().position(|(n, _)| n == name)?;
        Some(self.cameras.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.cameras.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CameraSettings)> + '_ {
        self.cameras.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// The ordered identity → placement mapping a mesh pipeline starts from.
    pub fn layout(&self) -> Vec<(CameraIdentity, PlacementParams)> {
        self.iter()
            .map(|(name, s)| (s.identity(name), s.placement()))
            .collect()
    }
}

impl Serialize for MeshConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cameras.len()))?;
        for (name, settings) in &self.cameras {
            map.serialize_entry(name, settings)?;
        }
        map.end()
    }
}

struct MeshConfigVisitor;

impl<'de> Visitor<'de> for MeshConfigVisitor {
    type Value = MeshConfig;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping camera names to camera settings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MeshConfig, A::Error> {
        let mut config = MeshConfig::new();
        while let Some((name, settings)) = access.next_entry::<String, CameraSettings>()? {
            config.insert(name, settings);
        }
        Ok(config)
    }
}

impl<'de> Deserialize<'de> for MeshConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MeshConfigVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_settings_defaults_missing_fields() {
        let cam: CameraSettings = serde_json::from_str(r#"{"device_id": 2}"#).unwrap();
        assert_eq!(cam, CameraSettings::new(2));
        assert_eq!(cam.opacity, 1.0);
    }

    #[test]
    fn camera_settings_requires_device_id() {
        let result = serde_json::from_str::<CameraSettings>(r#"{"x_offset": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn config_deserialises_in_file_order() {
        let json = r#"{
            "camera_2": {"device_id": 2, "x_offset": 400, "y_offset": 0,
                         "rotation_deg": 0, "opacity": 0.5},
            "camera_0": {"device_id": 0, "x_offset": 0, "y_offset": 0,
                         "rotation_deg": 90.0, "opacity": 1.0},
            "camera_1": {"device_id": 1}
        }"#;
        let config: MeshConfig = serde_json::from_str(json).unwrap();

        let names: Vec<&str> = config.names().collect();
        assert_eq!(names, vec!["camera_2", "camera_0", "camera_1"]);
        assert_eq!(config.get("camera_2").unwrap().x_offset, 400);
        assert_eq!(config.get("camera_0").unwrap().rotation_deg, 90.0);
    }

    #[test]
    fn config_serialises_in_insertion_order() {
        let mut config = MeshConfig::new();
        config.insert("zeta", CameraSettings::new(5));
        config.insert("alpha", CameraSettings::new(1));

        let json = serde_json::to_string(&config).unwrap();
        let zeta = json.find("zeta").unwrap();
        let alpha = json.find("alpha").unwrap();
        assert!(zeta < alpha);

        let restored: MeshConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut config = MeshConfig::new();
        config.insert("a", CameraSettings::new(0));
        config.insert("b", CameraSettings::new(1));
        let previous = config.insert("a", CameraSettings::new(7));

        assert_eq!(previous, Some(CameraSettings::new(0)));
        let names: Vec<&str> = config.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(config.get("a").unwrap().device_id, 7);
    }

    #[test]
    fn remove_returns_settings_once() {
        let mut config = MeshConfig::new();
        config.insert("a", CameraSettings::new(0));
        assert!(config.remove("a").is_some());
        assert!(config.remove("a").is_none());
        assert!(config.is_empty());
    }

    #[test]
    fn layout_binds_names_to_devices() {
        let mut config = MeshConfig::new();
        config.insert(
            "left",
            CameraSettings::with_placement(3, PlacementParams::new(0, 0, 0.0, 1.0)),
        );
        config.insert(
            "right",
            CameraSettings::with_placement(1, PlacementParams::new(400, 0, 0.0, 0.5)),
        );

        let layout = config.layout();
        assert_eq!(layout[0].0, CameraIdentity::new("left", 3));
        assert_eq!(layout[1].0, CameraIdentity::new("right", 1));
        assert_eq!(layout[1].1.opacity, 0.5);
    }

    #[test]
    fn apply_edits_one_field() {
        let mut cam = CameraSettings::new(0);
        cam.apply(ParamUpdate::RotationDeg(-30.0));
        cam.apply(ParamUpdate::YOffset(12));
        assert_eq!(cam.placement(), PlacementParams::new(0, 12, -30.0, 1.0));
    }

    #[test]
    fn device_index_parses_conventional_names() {
        assert_eq!(device_index_from_name("camera_3"), Some(3));
        assert_eq!(device_index_from_name("camera_x"), None);
        assert_eq!(device_index_from_name("front"), None);
    }
}
