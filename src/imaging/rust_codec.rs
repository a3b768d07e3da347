//! Pure Rust codec, no system libraries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` with content sniffing |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! Every output is JPEG. A single lossy format keeps the size/quality curve
//! predictable for the search, and JPEG is what the listing pages serve.

use super::codec::{CodecError, Dimensions, ImageCodec};
use super::normalize::ImageFile;
use super::params::EncodeParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Formats whose decoders are compiled in.
const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// Returns true when `format` can be decoded by [`RustCodec`].
pub fn can_decode(format: ImageFormat) -> bool {
    DECODABLE.contains(&format) && format.reading_enabled()
}

/// Pure Rust codec using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for RustCodec {
    type Image = DynamicImage;

    const MEDIA_TYPE: &'static str = "image/jpeg";
    const EXTENSION: &'static str = "jpg";

    fn decode(&self, file: &ImageFile) -> Result<DynamicImage, CodecError> {
        // The declared media type is only a hint; sniff the actual content.
        let reader = ImageReader::new(Cursor::new(&file.bytes)).with_guessed_format()?;
        match reader.format() {
            Some(format) if can_decode(format) => {}
            Some(format) => {
                return Err(CodecError::Decode(format!(
                    "{}: unsupported format {:?}",
                    file.name,
                    format
                )));
            }
            None => {
                return Err(CodecError::Decode(format!(
                    "{}: unrecognized image data",
                    file.name
                )));
            }
        }
        reader
            .decode()
            .map_err(|e| CodecError::Decode(format!("{}: {}", file.name, e)))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        Dimensions {
            width: image.width(),
            height: image.height(),
        }
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
        let resized;
        let source = if (image.width(), image.height()) == (params.width, params.height) {
            image
        } else {
            resized = image.resize_exact(params.width, params.height, FilterType::Lanczos3);
            &resized
        };

        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(source.to_rgb8());

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, params.quality.to_percent());
        rgb.write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(format!("JPEG encode failed: {}", e)))?;
        Ok(out)
    }
}
