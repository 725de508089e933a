//! Container decoding/encoding around the core.
//!
//! Accepts PNG, JPEG and WebP input and always writes PNG. Decoded pixels go
//! through 16-bit RGBA and are reduced to 8 bits by shifting, so every source
//! depth truncates the same way.

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use crate::error::{Result, PixelsError};

const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Reduce any decoded image to 8-bit RGBA by dropping the low byte
pub fn to_rgba8_truncated(img: &DynamicImage) -> RgbaImage {
    if let DynamicImage::ImageRgba8(rgba) = img {
        return rgba.clone();
    }

    let wide = img.to_rgba16();
    ImageBuffer::from_fn(wide.width(), wide.height(), |x, y| {
        let p = wide.get_pixel(x, y);
        Rgba([
            (p[0] >> 8) as u8,
            (p[1] >> 8) as u8,
            (p[2] >> 8) as u8,
            (p[3] >> 8) as u8,
        ])
    })
}

/// Decode PNG/JPEG/WebP bytes.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| PixelsError::Decode(format!("Unrecognised image data: {}", e)))?;

    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(PixelsError::Decode(format!("Unsupported image format: {:?}", format)));
    }

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PixelsError::Decode(format!("{:?}: {}", format, e)))?;

    tracing::debug!(
        "Decoded {:?} image {}x{} ({} bytes)",
        format,
        img.width(),
        img.height(),
        bytes.len()
    );

    Ok(to_rgba8_truncated(&img))
}

/// Encode as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PixelsError::Encode(e.to_string()))?;

    let png = buffer.into_inner();
    tracing::debug!("Encoded PNG {}x{} ({} bytes)", img.width(), img.height(), png.len());
    Ok(png)
}

/// Read and decode an image file
pub fn open(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| PixelsError::Processing(format!("Failed to load {}: {}", path.display(), e)))?;
    decode(&bytes)
}

/// Encode as PNG and write to `path`
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    std::fs::write(path, encode_png(img)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_round_trip_keeps_pixels() {
        let img: RgbaImage = ImageBuffer::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 100, 7, 200]));
        let decoded = decode(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_sixteen_bit_truncates() {
        let wide: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(1, 1, Rgba([0x12ff, 0xffff, 0x00ff, 0x8000]));
        let narrow = to_rgba8_truncated(&DynamicImage::ImageRgba16(wide));
        assert_eq!(*narrow.get_pixel(0, 0), Rgba([0x12, 0xff, 0x00, 0x80]));
    }

    #[test]
    fn test_eight_bit_rgb_gets_opaque_alpha() {
        let rgb = image::RgbImage::from_pixel(1, 1, image::Rgb([9, 8, 7]));
        let rgba = to_rgba8_truncated(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(decode(b"not an image"), Err(PixelsError::Decode(_))));
    }

    #[test]
    fn test_rejects_unsupported_container() {
        // BMP magic
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        assert!(matches!(decode(&bmp), Err(PixelsError::Decode(_))));
    }
}
