//! Image encoding: embedded image bytes → base64 data URI and `<img>` tag.
//!
//! JPEG (`DCTDecode`) and JPEG 2000 (`JPXDecode`) streams are already
//! self-contained files, so their bytes go into the data URI untouched.
//! Raw sample streams have no container; they are wrapped as PNG through the
//! `image` crate so the browser can display them.

use crate::output::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Bytes of one image in a browser-displayable container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Extension used in the MIME subtype: `jpeg`, `jpx` or `png`.
    pub format: &'static str,
    pub bytes: Vec<u8>,
}

/// Wrap decoded 8-bit samples as a PNG file.
///
/// `components` is 1 (gray), 3 (RGB) or 4 (CMYK, converted naively to RGB).
pub fn samples_to_png(
    width: u32,
    height: u32,
    components: u8,
    samples: &[u8],
) -> Result<RawImage, String> {
    if width == 0 || height == 0 {
        return Err("image has zero width or height".into());
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(components as usize))
        .ok_or_else(|| "image dimensions overflow".to_string())?;
    if samples.len() < expected {
        return Err(format!(
            "sample data too short: {} bytes for {}x{}x{}",
            samples.len(),
            width,
            height,
            components
        ));
    }
    let samples = &samples[..expected];

    let img = match components {
        1 => GrayImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageRgb8),
        4 => RgbImage::from_raw(width, height, cmyk_to_rgb(samples)).map(DynamicImage::ImageRgb8),
        n => return Err(format!("unsupported component count {}", n)),
    }
    .ok_or_else(|| "sample buffer does not match dimensions".to_string())?;

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(RawImage {
        format: "png",
        bytes: buf,
    })
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            let ch = |c: u8| ((255 - c as u16) * k / 255) as u8;
            [ch(px[0]), ch(px[1]), ch(px[2])]
        })
        .collect()
}

/// Base64-encode an image into its data URI.
pub fn encode_image(page: usize, index: usize, raw: &RawImage) -> EncodedImage {
    let b64 = STANDARD.encode(&raw.bytes);
    debug!(
        "Page {} image {}: {} bytes → {} bytes base64 ({})",
        page,
        index,
        raw.bytes.len(),
        b64.len(),
        raw.format
    );
    EncodedImage {
        page,
        index,
        format: raw.format.to_string(),
        data_uri: format!("data:image/{};base64,{}", raw.format, b64),
    }
}

/// The `<img>` element inserted into the prompt for one image.
pub fn img_tag(image: &EncodedImage) -> String {
    format!(
        "<img src=\"{}\" alt=\"PDF Image {}\" style=\"max-width:100%; margin:10px 0;\"/>",
        image.data_uri, image.index
    )
}

/// Split a `data:image/…;base64,…` URI back into format and bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:image/")?;
    let (format, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((format.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bytes_survive_the_data_uri() {
        let raw = RawImage {
            format: "jpeg",
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9],
        };
        let encoded = encode_image(1, 0, &raw);
        assert!(encoded.data_uri.starts_with("data:image/jpeg;base64,"));
        let (format, bytes) = decode_data_uri(&encoded.data_uri).expect("valid uri");
        assert_eq!(format, "jpeg");
        assert_eq!(bytes, raw.bytes);
    }

    #[test]
    fn tag_layout() {
        let encoded = encode_image(
            3,
            2,
            &RawImage {
                format: "png",
                bytes: vec![1, 2, 3],
            },
        );
        assert_eq!(
            img_tag(&encoded),
            "<img src=\"data:image/png;base64,AQID\" alt=\"PDF Image 2\" style=\"max-width:100%; margin:10px 0;\"/>"
        );
    }

    #[test]
    fn rgb_samples_become_png() {
        let samples = vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let raw = samples_to_png(2, 2, 3, &samples).expect("encodes");
        assert_eq!(raw.format, "png");
        let img = image::load_from_memory(&raw.bytes).expect("valid png");
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_rgb8().get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn cmyk_black_is_black() {
        let raw = samples_to_png(1, 1, 4, &[0, 0, 0, 255]).expect("encodes");
        let img = image::load_from_memory(&raw.bytes).unwrap();
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn short_sample_buffer_is_rejected() {
        assert!(samples_to_png(4, 4, 3, &[0u8; 10]).is_err());
        assert!(samples_to_png(0, 4, 1, &[]).is_err());
        assert!(samples_to_png(1, 1, 2, &[0, 0]).is_err());
    }

    #[test]
    fn huge_dimensions_are_rejected_not_multiplied() {
        let err = samples_to_png(u32::MAX, u32::MAX, 4, &[0u8; 16]).unwrap_err();
        assert_eq!(err, "image dimensions overflow");
    }

    #[test]
    fn foreign_uri_does_not_decode() {
        assert!(decode_data_uri("https://example.com/a.png").is_none());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_none());
    }
}
