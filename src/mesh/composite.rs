use crate::mesh::frame::{Canvas, Layer, RGBA_CHANNELS};

pub type Rgba8 = [u8; 4];

/// The "over" operator for one pixel, straight alpha, 8-bit fixed point:
///
/// `out.rgb = src.rgb * src.a + dst.rgb * (1 - src.a)`
/// `out.a   = src.a + dst.a * (1 - src.a)`
pub fn over(dst: Rgba8, src: Rgba8) -> Rgba8 {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let inv = 255 - sa;

    let mut out = [0u8; 4];
    for ((o, &s), &d) in out.iter_mut().zip(&src[..3]).zip(&dst[..3]) {
        *o = div255(u32::from(s) * sa + u32::from(d) * inv);
    }
    out[3] = (sa + u32::from(div255(u32::from(dst[3]) * inv))).min(255) as u8;
    out
}

fn div255(x: u32) -> u8 {
    ((x + 127) / 255).min(255) as u8
}

/// Composite `src` over `dst` in place. Both must have the same size.
pub fn over_in_place(dst: &mut Canvas, src: &Layer) {
    assert_eq!(
        dst.dimensions(),
        src.dimensions(),
        "layers composited together must share the canvas size"
    );
    for (d, s) in dst
        .data_mut()
        .chunks_exact_mut(RGBA_CHANNELS)
        .zip(src.data().chunks_exact(RGBA_CHANNELS))
    {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
}

/// Folds an ordered stack of layers into one canvas, bottom to top.
///
/// "Over" is not commutative: the first layer is the bottom of the stack
/// and the order is never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    width: u32,
    height: u32,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Blend `layers` onto a fresh transparent canvas.
    ///
    /// Panics if a layer's size differs from the compositor's; callers
    /// build every layer at the fixed canvas size.
    pub fn blend(&self, layers: &[Layer]) -> Canvas {
        let mut canvas = Canvas::transparent(self.width, self.height);
        for layer in layers {
            over_in_place(&mut canvas, layer);
        }
        canvas
    }
}
