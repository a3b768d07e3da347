//! Shared test utilities for the carlot test suite.
//!
//! Synthetic image builders. Noise images are used throughout because they
//! compress poorly, so encoded sizes respond to quality and resolution the
//! way camera photos do.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = png_file("front.png", 64, 48);
//! let jpeg = jpeg_file("rear.jpg", 64, 48, 90);
//! assert!(png.size() > 0);
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::imaging::ImageFile;

// =========================================================================
// Pixel sources
// =========================================================================

/// Deterministic RGB noise (xorshift32). Same seed, same pixels.
pub fn noise_rgb(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    RgbImage::from_fn(width, height, |_, _| {
        let v = next();
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    })
}

/// Smooth horizontal gradient. Compresses very well.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        let v = ((x * 255) / width.max(1)) as u8;
        Rgb([v, v / 2, 255 - v])
    })
}

// =========================================================================
// Encoders
// =========================================================================

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Encode as JPEG at `quality` percent (1..=100).
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    DynamicImage::ImageRgb8(img.clone())
        .write_with_encoder(encoder)
        .unwrap();
    out
}

// =========================================================================
// ImageFile builders
// =========================================================================

pub fn png_file(name: &str, width: u32, height: u32) -> ImageFile {
    ImageFile::new(name, "image/png", encode_png(&noise_rgb(width, height, 7)))
}

pub fn jpeg_file(name: &str, width: u32, height: u32, quality: u8) -> ImageFile {
    ImageFile::new(
        name,
        "image/jpeg",
        encode_jpeg(&noise_rgb(width, height, 11), quality),
    )
}

/// An image-typed file of exactly `size` filler bytes. Not decodable.
pub fn opaque_file(name: &str, size: usize) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0x5A; size])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic() {
        assert_eq!(noise_rgb(8, 8, 3), noise_rgb(8, 8, 3));
        assert_ne!(noise_rgb(8, 8, 3), noise_rgb(8, 8, 4));
    }

    #[test]
    fn noise_compresses_worse_than_gradient() {
        let noise = encode_png(&noise_rgb(64, 64, 1));
        let smooth = encode_png(&gradient_rgb(64, 64));
        assert!(noise.len() > smooth.len());
    }

    #[test]
    fn builders_produce_decodable_files() {
        let png = png_file("a.png", 16, 8);
        let jpeg = jpeg_file("b.jpg", 16, 8, 80);
        assert_eq!(image::guess_format(&png.bytes).unwrap(), ImageFormat::Png);
        assert_eq!(image::guess_format(&jpeg.bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(opaque_file("c.jpg", 100).size(), 100);
    }
}
