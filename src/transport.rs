//! `data:` URL encoding for images crossing a text boundary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use crate::codec;
use crate::error::{Result, PixelsError};

const PNG_PREFIX: &str = "data:image/png;base64,";

const ACCEPTED_PREFIXES: [(&str, ImageFormat); 4] = [
    ("data:image/webp;base64,", ImageFormat::WebP),
    (PNG_PREFIX, ImageFormat::Png),
    ("data:image/jpeg;base64,", ImageFormat::Jpeg),
    ("data:image/jpg;base64,", ImageFormat::Jpeg),
];

/// Split a base64 `data:` URL into its declared format and raw bytes.
pub fn parse_data_url(data_url: &str) -> Result<(ImageFormat, Vec<u8>)> {
    let (payload, format) = ACCEPTED_PREFIXES
        .iter()
        .find_map(|(prefix, format)| data_url.strip_prefix(*prefix).map(|rest| (rest, *format)))
        .ok_or_else(|| PixelsError::Transport("Unsupported image format".to_string()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| PixelsError::Transport(format!("Base64 decode error: {}", e)))?;

    Ok((format, bytes))
}

/// Decode an image carried in a `data:` URL
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage> {
    let (declared, bytes) = parse_data_url(data_url)?;
    codec::decode(&bytes).map_err(|e| match e {
        PixelsError::Decode(msg) => PixelsError::Decode(format!("{} (declared format: {:?})", msg, declared)),
        other => other,
    })
}

/// Encode as PNG wrapped in a `data:image/png;base64,` URL
pub fn to_png_data_url(img: &RgbaImage) -> Result<String> {
    let png = codec::encode_png(img)?;
    Ok(format!("{}{}", PNG_PREFIX, STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    #[test]
    fn test_parse_known_prefixes() {
        let (format, bytes) = parse_data_url("data:image/jpg;base64,AAEC").unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!(bytes, vec![0, 1, 2]);

        let (format, _) = parse_data_url("data:image/webp;base64,AAEC").unwrap();
        assert_eq!(format, ImageFormat::WebP);
    }

    #[test]
    fn test_rejects_unknown_prefix() {
        let err = parse_data_url("data:image/gif;base64,AAEC").unwrap_err();
        assert_eq!(err.to_string(), "Transport error: Unsupported image format");
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert!(matches!(
            parse_data_url("data:image/png;base64,***"),
            Err(PixelsError::Transport(_))
        ));
    }

    #[test]
    fn test_png_data_url_round_trip() {
        let img: RgbaImage = ImageBuffer::from_pixel(2, 3, Rgba([1, 2, 3, 4]));
        let url = to_png_data_url(&img).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), img);
    }
}
