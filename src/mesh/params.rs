use serde::{Deserialize, Serialize};

/// Where and how one camera's layer is placed on the canvas.
///
/// Owned by the caller and passed by value into every transform.
/// Out-of-range values are corrected, never rejected: see
/// [`PlacementParams::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementParams {
    /// Canvas x of the layer's top-left corner; may be negative.
    pub x_offset: i32,
    /// Canvas y of the layer's top-left corner; may be negative.
    pub y_offset: i32,
    /// Counter-clockwise rotation about the frame centre, any range.
    pub rotation_deg: f64,
    /// Layer opacity, clamped to `[0, 1]`.
    pub opacity: f64,
}

impl PlacementParams {
    pub fn new(x_offset: i32, y_offset: i32, rotation_deg: f64, opacity: f64) -> Self {
        Self {
            x_offset,
            y_offset,
            rotation_deg,
            opacity,
        }
    }

    /// Opacity clamped to `[0, 1]`. NaN is treated as fully opaque, the
    /// config default.
    pub fn clamped_opacity(&self) -> f64 {
        if self.opacity.is_nan() {
            1.0
        } else {
            self.opacity.clamp(0.0, 1.0)
        }
    }

    /// Rotation wrapped into `[0, 360)`. Non-finite angles become 0.
    pub fn wrapped_rotation(&self) -> f64 {
        if !self.rotation_deg.is_finite() {
            return 0.0;
        }
        let wrapped = self.rotation_deg.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs.
        if wrapped >= 360.0 {
            0.0
        } else {
            wrapped
        }
    }

    /// Copy with opacity clamped and rotation wrapped. Offsets are kept as
    /// given: moving content off-canvas is legitimate.
    pub fn normalized(self) -> Self {
        Self {
            rotation_deg: self.wrapped_rotation(),
            opacity: self.clamped_opacity(),
            ..self
        }
    }
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self::new(0, 0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity_placement() {
        let p = PlacementParams::default();
        assert_eq!(p, PlacementParams::new(0, 0, 0.0, 1.0));
    }

    #[test]
    fn opacity_is_clamped_not_wrapped() {
        assert_eq!(PlacementParams::new(0, 0, 0.0, 1.7).clamped_opacity(), 1.0);
        assert_eq!(PlacementParams::new(0, 0, 0.0, -0.3).clamped_opacity(), 0.0);
        assert_eq!(PlacementParams::new(0, 0, 0.0, 0.4).clamped_opacity(), 0.4);
        assert_eq!(
            PlacementParams::new(0, 0, 0.0, f64::NAN).clamped_opacity(),
            1.0
        );
    }

    #[test]
    fn rotation_wraps_mod_360() {
        assert_eq!(PlacementParams::new(0, 0, 370.0, 1.0).wrapped_rotation(), 10.0);
        assert_eq!(PlacementParams::new(0, 0, -90.0, 1.0).wrapped_rotation(), 270.0);
        assert_eq!(PlacementParams::new(0, 0, 720.0, 1.0).wrapped_rotation(), 0.0);
        assert_eq!(PlacementParams::new(0, 0, -1e-20, 1.0).wrapped_rotation(), 0.0);
        assert_eq!(
            PlacementParams::new(0, 0, f64::INFINITY, 1.0).wrapped_rotation(),
            0.0
        );
    }

    #[test]
    fn normalized_keeps_offsets() {
        let p = PlacementParams::new(-500, 9000, -45.0, 3.0).normalized();
        assert_eq!(p, PlacementParams::new(-500, 9000, 315.0, 1.0));
    }
}
