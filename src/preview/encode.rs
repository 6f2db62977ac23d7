use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, Rgb};
use thiserror::Error;

use crate::mesh::frame::{Canvas, Frame, ResizeError};

/// Default JPEG quality for preview frames.
pub const PREVIEW_QUALITY: u8 = 85;
/// Quality used for downscaled thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 70;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("write to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resize(#[from] ResizeError),

    #[error("buffer does not match {0}x{1}")]
    Dimensions(u32, u32),

    #[error("unsupported image extension: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, EncodeError>;

fn rgb_image(data: &[u8], width: u32, height: u32) -> Result<ImageBuffer<Rgb<u8>, &[u8]>> {
    ImageBuffer::from_raw(width, height, data).ok_or(EncodeError::Dimensions(width, height))
}

/// Compress raw RGB pixel data to JPEG at the given quality (1-100).
pub fn compress_jpeg(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let img = rgb_image(data, width, height)?;
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Flatten a canvas to RGB and encode it as `format`.
pub fn encode_canvas(canvas: &Canvas, format: ImageFormat) -> Result<Vec<u8>> {
    let rgb = canvas.to_rgb();
    if format == ImageFormat::Jpeg {
        return compress_jpeg(&rgb, canvas.width(), canvas.height(), PREVIEW_QUALITY);
    }
    let img = rgb_image(&rgb, canvas.width(), canvas.height())?;
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Downscale a canvas and encode it as a small JPEG.
pub fn thumbnail(canvas: &Canvas, width: u32, height: u32) -> Result<Vec<u8>> {
    let frame = Frame::from_raw(canvas.width(), canvas.height(), canvas.to_rgb())
        .ok_or(EncodeError::Dimensions(canvas.width(), canvas.height()))?;
    let small = frame.resized(width, height)?;
    compress_jpeg(small.data(), width, height, THUMBNAIL_QUALITY)
}

/// Image format implied by `path`'s extension; PNG and JPEG only.
pub fn format_for_path(path: &Path) -> Result<ImageFormat> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Ok(format),
        _ => Err(EncodeError::UnsupportedFormat(
            path.extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )),
    }
}

/// Write `bytes` to `path` atomically (write .tmp then rename), so a
/// viewer polling the file never reads a half-written image.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| EncodeError::Io { path, source }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io(parent))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(io(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io(path))?;
    Ok(())
}

/// Encode by extension and write atomically.
pub fn save_canvas(canvas: &Canvas, path: &Path) -> Result<()> {
    let format = format_for_path(path)?;
    write_atomic(path, &encode_canvas(canvas, format)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Create a synthetic RGB test image (gradient pattern).
    fn make_test_rgb(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x % 256) as u8); // R
                data.push((y % 256) as u8); // G
                data.push(128); // B
            }
        }
        data
    }

    fn make_canvas(width: u32, height: u32) -> Canvas {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for px in make_test_rgb(width, height).chunks_exact(3) {
            data.extend_from_slice(px);
            data.push(255);
        }
        Canvas::from_raw(width, height, data).unwrap()
    }

    #[test]
    fn compress_jpeg_produces_valid_jpeg_bytes() {
        let rgb = make_test_rgb(640, 480);
        let jpeg = compress_jpeg(&rgb, 640, 480, 85).unwrap();
        // JPEG files start with FF D8
        assert_eq!(jpeg[0], 0xFF);
        assert_eq!(jpeg[1], 0xD8);
    }

    #[test]
    fn compress_jpeg_rejects_short_buffer() {
        let result = compress_jpeg(&[0; 10], 640, 480, 85);
        assert!(matches!(result, Err(EncodeError::Dimensions(640, 480))));
    }

    #[test]
    fn compress_jpeg_lower_quality_produces_smaller_output() {
        let rgb = make_test_rgb(800, 600);
        let high = compress_jpeg(&rgb, 800, 600, 85).unwrap();
        let low = compress_jpeg(&rgb, 800, 600, 50).unwrap();
        assert!(
            low.len() < high.len(),
            "quality 50 ({}) should be smaller than quality 85 ({})",
            low.len(),
            high.len()
        );
    }

    #[test]
    fn png_export_decodes_to_canvas_rgb() {
        let canvas = make_canvas(32, 16);
        let png = encode_canvas(&canvas, ImageFormat::Png).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (32, 16));
        assert_eq!(decoded.into_raw(), canvas.to_rgb());
    }

    #[test]
    fn thumbnail_is_small_jpeg() {
        let canvas = make_canvas(800, 600);
        let thumb = thumbnail(&canvas, 160, 120).unwrap();
        assert_eq!(&thumb[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 120));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            format_for_path(Path::new("out/still.png")).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            format_for_path(Path::new("live.JPG")).unwrap(),
            ImageFormat::Jpeg
        );
        assert!(matches!(
            format_for_path(Path::new("clip.gif")),
            Err(EncodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn save_canvas_writes_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("still.jpg");
        save_canvas(&make_canvas(64, 48), &path).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("nested").join("still.jpg.tmp").exists());
    }
}
