//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the two operations the size normalizer
//! needs: decode an input file once, then encode the decoded image at a given
//! size and quality as many times as the search requires.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec), pure Rust with no system
//! libraries. Tests use the recording `MockCodec` in this module.

use super::normalize::ImageFile;
use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn long_edge(self) -> u32 {
        self.width.max(self.height)
    }
}

/// Trait for image codecs.
///
/// `Sync` so one codec can be shared across rayon workers normalizing
/// different files.
pub trait ImageCodec: Sync {
    /// Decoded in-memory image.
    type Image;

    /// Media type of everything [`encode`](Self::encode) produces.
    const MEDIA_TYPE: &'static str;
    /// File extension matching [`MEDIA_TYPE`](Self::MEDIA_TYPE).
    const EXTENSION: &'static str;

    /// Decode an input file.
    fn decode(&self, file: &ImageFile) -> Result<Self::Image, CodecError>;

    /// Dimensions of a decoded image.
    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Resize to `params.width × params.height` and encode at `params.quality`.
    fn encode(&self, image: &Self::Image, params: &EncodeParams) -> Result<Vec<u8>, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use std::sync::Mutex;

    /// Mock codec that records operations and produces synthetic output.
    ///
    /// Output size follows a simple model: `bytes_per_pixel_at_max × pixels ×
    /// quality`, so tests can reason about where each attempt lands.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockCodec {
        pub source: Dimensions,
        pub bytes_per_pixel_at_max: f64,
        pub fail_decode: bool,
        /// Attempts (1-based) whose encode should fail. `None` = never fail.
        pub fail_encodes: Option<Vec<usize>>,
        pub fail_all_encodes: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(String),
        Encode {
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl MockCodec {
        pub fn new(width: u32, height: u32, bytes_per_pixel_at_max: f64) -> Self {
            Self {
                source: Dimensions { width, height },
                bytes_per_pixel_at_max,
                fail_decode: false,
                fail_encodes: None,
                fail_all_encodes: false,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_decode() -> Self {
            Self {
                fail_decode: true,
                ..Self::new(100, 100, 1.0)
            }
        }

        pub fn failing_encode(width: u32, height: u32) -> Self {
            Self {
                fail_all_encodes: true,
                ..Self::new(width, height, 1.0)
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                .count()
        }

        /// Size the model predicts for the given parameters.
        pub fn predicted_size(&self, width: u32, height: u32, quality: Quality) -> usize {
            let pixels = width as f64 * height as f64;
            ((pixels * self.bytes_per_pixel_at_max * quality.value() as f64).round() as usize)
                .max(1)
        }
    }

    impl ImageCodec for MockCodec {
        type Image = Dimensions;

        const MEDIA_TYPE: &'static str = "image/jpeg";
        const EXTENSION: &'static str = "jpg";

        fn decode(&self, file: &ImageFile) -> Result<Dimensions, CodecError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(file.name.clone()));
            if self.fail_decode {
                return Err(CodecError::Decode("corrupt input".into()));
            }
            Ok(self.source)
        }

        fn dimensions(&self, image: &Dimensions) -> Dimensions {
            *image
        }

        fn encode(&self, _image: &Dimensions, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
            let attempt = {
                let mut ops = self.operations.lock().unwrap();
                ops.push(RecordedOp::Encode {
                    width: params.width,
                    height: params.height,
                    quality: params.quality.to_percent() as u32,
                });
                ops.iter()
                    .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                    .count()
            };
            let fails = self.fail_all_encodes
                || self
                    .fail_encodes
                    .as_ref()
                    .is_some_and(|attempts| attempts.contains(&attempt));
            if fails {
                return Err(CodecError::Encode("codec unavailable".into()));
            }
            let size = self.predicted_size(params.width, params.height, params.quality);
            Ok(vec![0xAB; size])
        }
    }

    #[test]
    fn mock_records_decode() {
        let codec = MockCodec::new(800, 600, 1.0);
        let file = ImageFile::new("car.jpg", "image/jpeg", vec![1, 2, 3]);

        let dims = codec.decode(&file).unwrap();
        assert_eq!(dims.long_edge(), 800);

        let ops = codec.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode("car.jpg".into())]);
    }

    #[test]
    fn mock_encode_size_scales_with_quality() {
        let codec = MockCodec::new(100, 100, 2.0);
        let dims = Dimensions {
            width: 100,
            height: 100,
        };

        let high = codec
            .encode(
                &dims,
                &EncodeParams {
                    width: 100,
                    height: 100,
                    quality: Quality::new(1.0),
                },
            )
            .unwrap();
        let low = codec
            .encode(
                &dims,
                &EncodeParams {
                    width: 100,
                    height: 100,
                    quality: Quality::new(0.5),
                },
            )
            .unwrap();

        assert_eq!(high.len(), 20_000);
        assert_eq!(low.len(), 10_000);
        assert_eq!(codec.encode_count(), 2);
    }

    #[test]
    fn mock_fails_selected_attempts() {
        let codec = MockCodec {
            fail_encodes: Some(vec![2]),
            ..MockCodec::new(10, 10, 1.0)
        };
        let dims = codec.source;
        let params = EncodeParams {
            width: 10,
            height: 10,
            quality: Quality::new(1.0),
        };

        assert!(codec.encode(&dims, &params).is_ok());
        assert!(matches!(
            codec.encode(&dims, &params),
            Err(CodecError::Encode(_))
        ));
        assert!(codec.encode(&dims, &params).is_ok());
    }
}
