//! Capture preparation before upload

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};

use super::VisionError;

/// Decode a captured image, flatten it onto white and re-encode as PNG.
///
/// Transparent regions of a capture would otherwise reach the model as
/// black.
pub fn prepare_png(bytes: &[u8]) -> Result<Vec<u8>, VisionError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| VisionError::Image(e.to_string()))?;
    let rgba = decoded.to_rgba8();

    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let over_white = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([over_white(r), over_white(g), over_white(b)])
    });

    let mut png = Cursor::new(Vec::new());
    flattened
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| VisionError::Image(e.to_string()))?;
    Ok(png.into_inner())
}

/// Embed PNG bytes as a data URL for the chat API
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn encode(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([200, 10, 10, 255]));

        let png = prepare_png(&encode(&img)).unwrap();
        let out = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [200, 10, 10]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(prepare_png(b"not an image"), Err(VisionError::Image(_))));
    }

    #[test]
    fn test_data_url_prefix() {
        assert_eq!(png_data_url(&[1, 2, 3]), "data:image/png;base64,AQID");
    }
}
