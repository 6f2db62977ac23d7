//! Pixel buffers flowing through the mesh: RGB camera frames in, RGBA
//! layers and canvases out. All buffers are row-major and tightly packed.

use fast_image_resize as fr;

pub const RGB_CHANNELS: usize = 3;
pub const RGBA_CHANNELS: usize = 4;

/// Errors from resizing a frame.
#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("invalid source buffer: {0}")]
    Buffer(String),
    #[error("resize failed: {0}")]
    Resize(String),
    #[error("zero-sized target {0}x{1}")]
    EmptyTarget(u32, u32),
}

fn buffer_len(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

/// An RGB8 frame at the camera's capture resolution.
///
/// Frames are immutable once built; the acquisition loop publishes a new
/// frame rather than writing into one a consumer may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGB bytes. Returns `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == buffer_len(width, height, RGB_CHANNELS)).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// An all-zero (black) frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; buffer_len(width, height, RGB_CHANNELS)],
        }
    }

    /// Build a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(buffer_len(width, height, RGB_CHANNELS));
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGB value at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Resample to a new resolution.
    ///
    /// Uses `fast_image_resize` for SIMD-accelerated resizing. Returns a
    /// clone when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self, ResizeError> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 {
            return Err(ResizeError::EmptyTarget(width, height));
        }
        let src = fr::images::Image::from_vec_u8(
            self.width,
            self.height,
            self.data.clone(),
            fr::PixelType::U8x3,
        )
        .map_err(|e| ResizeError::Buffer(e.to_string()))?;
        let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x3);
        fr::Resizer::new()
            .resize(&src, &mut dst, None)
            .map_err(|e| ResizeError::Resize(e.to_string()))?;
        Ok(Self {
            width,
            height,
            data: dst.into_vec(),
        })
    }
}

/// An RGBA8 buffer at canvas resolution, straight (non-premultiplied) alpha.
///
/// Both the per-camera layers and the finished composite use this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// The composite under construction, and the result handed to callers.
pub type Canvas = Layer;

impl Layer {
    /// A fully transparent buffer (every channel zero).
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; buffer_len(width, height, RGBA_CHANNELS)],
        }
    }

    /// Wrap raw RGBA bytes. Returns `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == buffer_len(width, height, RGBA_CHANNELS)).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Iterate over the alpha channel.
    pub fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.chunks_exact(RGBA_CHANNELS).map(|px| px[3])
    }

    /// Drop the alpha channel, e.g. for display or JPEG export.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(buffer_len(self.width, self.height, RGB_CHANNELS));
        for px in self.data.chunks_exact(RGBA_CHANNELS) {
            rgb.extend_from_slice(&px[..RGB_CHANNELS]);
        }
        rgb
    }
}
