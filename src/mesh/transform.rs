//! Per-camera layer transform: rotate about the frame centre, place on the
//! canvas at an integer offset, clip, then scale alpha by opacity.

use crate::mesh::frame::{Frame, Layer, RGBA_CHANNELS};
use crate::mesh::params::PlacementParams;

/// Inverse rotation used to find, for each output pixel, where to sample
/// the source frame. Output size equals input size; nothing is expanded.
struct Rotation {
    cos: f64,
    sin: f64,
    cx: f64,
    cy: f64,
}

impl Rotation {
    /// Counter-clockwise rotation by `degrees` about `(w / 2, h / 2)`
    /// (integer division).
    fn new(frame: &Frame, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            cos,
            sin,
            cx: f64::from(frame.width() / 2),
            cy: f64::from(frame.height() / 2),
        }
    }

    fn source_point(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.cx;
        let dy = y - self.cy;
        (
            self.cos * dx - self.sin * dy + self.cx,
            self.sin * dx + self.cos * dy + self.cy,
        )
    }
}

/// Bilinear sample of an opaque frame at a fractional position.
///
/// Neighbours outside the frame count as transparent black, so rotated
/// edges fade out instead of darkening. Colour is averaged over the
/// covered neighbours only.
fn sample_bilinear(frame: &Frame, sx: f64, sy: f64) -> [u8; 4] {
    let (fx0, fy0) = (sx.floor(), sy.floor());
    let (fx, fy) = (sx - fx0, sy - fy0);
    let (x0, y0) = (fx0 as i64, fy0 as i64);
    let (w, h) = (i64::from(frame.width()), i64::from(frame.height()));

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 3];
    let mut coverage = 0.0;
    for (px, py, weight) in taps {
        if weight <= 0.0 || px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let rgb = frame.pixel(px as u32, py as u32);
        for (sum, value) in acc.iter_mut().zip(rgb) {
            *sum += weight * f64::from(value);
        }
        coverage += weight;
    }

    if coverage <= 0.0 {
        return [0; 4];
    }
    [
        to_u8(acc[0] / coverage),
        to_u8(acc[1] / coverage),
        to_u8(acc[2] / coverage),
        to_u8(coverage * 255.0),
    ]
}

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Turns one camera frame plus its placement into a canvas-sized layer.
///
/// Stateless apart from the canvas size; the same inputs always give the
/// same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerTransformer {
    canvas_width: u32,
    canvas_height: u32,
}

impl LayerTransformer {
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    /// Rotate, place and fade `frame` onto a transparent canvas-sized layer.
    ///
    /// Offsets may put the frame partly or wholly off-canvas; the visible
    /// part is clipped and the rest of the layer stays transparent.
    pub fn transform(&self, frame: &Frame, params: &PlacementParams) -> Layer {
        let params = params.normalized();
        let mut layer = Layer::transparent(self.canvas_width, self.canvas_height);

        let (x0, y0) = (i64::from(params.x_offset), i64::from(params.y_offset));
        let x_start = x0.max(0);
        let y_start = y0.max(0);
        let x_end = (x0 + i64::from(frame.width())).min(i64::from(self.canvas_width));
        let y_end = (y0 + i64::from(frame.height())).min(i64::from(self.canvas_height));
        if x_start >= x_end || y_start >= y_end || params.opacity <= 0.0 {
            return layer;
        }

        let rotation =
            (params.rotation_deg != 0.0).then(|| Rotation::new(frame, params.rotation_deg));
        let opacity = params.opacity;
        let stride = self.canvas_width as usize * RGBA_CHANNELS;
        let data = layer.data_mut();

        for cy in y_start..y_end {
            let ly = cy - y0;
            let row = cy as usize * stride;
            for cx in x_start..x_end {
                let lx = cx - x0;
                let [r, g, b, a] = match &rotation {
                    None => {
                        let [r, g, b] = frame.pixel(lx as u32, ly as u32);
                        [r, g, b, u8::MAX]
                    }
                    Some(rot) => {
                        let (sx, sy) = rot.source_point(lx as f64, ly as f64);
                        sample_bilinear(frame, sx, sy)
                    }
                };
                let i = row + cx as usize * RGBA_CHANNELS;
                data[i] = r;
                data[i + 1] = g;
                data[i + 2] = b;
                data[i + 3] = to_u8(f64::from(a) * opacity);
            }
        }

        layer
    }
}
